// Transcoding worker contract
//
// A worker claims the oldest unstarted recording in a given type/state, does
// its work outside the database, then reports back under the job key it was
// handed. Claiming is a single UPDATE so two workers never receive the same
// row.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RecordingError, Result};
use crate::recording::lifecycle::validate_state;
use crate::recording::types::{RecordingId, PROCESSING_ATTRIBUTES};

/// The slice of a recording a worker needs
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    pub id: RecordingId,
    pub raw_file_key: Option<String>,
    pub file_key: Option<String>,
    pub processing_meta: Option<Json<serde_json::Value>>,
    pub processing_state: Option<String>,
    pub job_key: Option<String>,
    #[serde(rename = "type")]
    pub recording_type: Option<String>,
}

/// What a worker reports when it finishes a job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    /// State the recording moves to
    pub processing_state: String,
    pub file_key: Option<String>,
    pub file_size: Option<i64>,
    pub file_mime_type: Option<String>,
    pub processing_meta: Option<serde_json::Value>,
    pub passed_filter: Option<bool>,
}

#[derive(Clone)]
pub struct ProcessingQueue {
    pool: SqlitePool,
}

impl ProcessingQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn returning_columns() -> String {
        PROCESSING_ATTRIBUTES.join(", ")
    }

    /// Claim the oldest recording of `recording_type` waiting in `state`.
    pub async fn claim_next(
        &self,
        recording_type: &str,
        state: &str,
    ) -> Result<Option<ProcessingJob>> {
        validate_state(Some(recording_type), state)?;

        let job_key = Uuid::new_v4().to_string();
        let now = Utc::now();
        let sql = format!(
            "UPDATE recordings
             SET processing_start_time = ?, job_key = ?, updated_at = ?
             WHERE id = (
                 SELECT id FROM recordings
                 WHERE recording_type = ? AND processing_state = ?
                   AND processing_start_time IS NULL
                 ORDER BY created_at ASC, id ASC
                 LIMIT 1
             )
             AND processing_start_time IS NULL
             RETURNING {}",
            Self::returning_columns()
        );

        let job = sqlx::query_as::<_, ProcessingJob>(&sql)
            .bind(now)
            .bind(&job_key)
            .bind(now)
            .bind(recording_type)
            .bind(state)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(job) = &job {
            info!(
                "🎬 Claimed recording {} for {} (job {})",
                job.id, state, job_key
            );
        }
        Ok(job)
    }

    /// The job currently claimed under `job_key`, if any.
    pub async fn job(&self, job_key: &str) -> Result<Option<ProcessingJob>> {
        let sql = format!(
            "SELECT {} FROM recordings WHERE job_key = ?",
            Self::returning_columns()
        );
        let job = sqlx::query_as::<_, ProcessingJob>(&sql)
            .bind(job_key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    /// Store a worker's output and release the claim.
    pub async fn complete(&self, job_key: &str, result: ProcessingResult) -> Result<RecordingId> {
        let mut tx = self.pool.begin().await?;

        let claimed: Option<(RecordingId, Option<String>)> =
            sqlx::query_as("SELECT id, recording_type FROM recordings WHERE job_key = ?")
                .bind(job_key)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((id, recording_type)) = claimed else {
            warn!("Completion reported for unknown job {}", job_key);
            return Err(RecordingError::UnknownJob(job_key.to_string()));
        };

        validate_state(recording_type.as_deref(), &result.processing_state)?;

        sqlx::query(
            "UPDATE recordings
             SET processing_state = ?, file_key = ?, file_size = ?, file_mime_type = ?,
                 processing_meta = ?, passed_filter = ?,
                 processing_start_time = NULL, job_key = NULL, updated_at = ?
             WHERE id = ?",
        )
        .bind(&result.processing_state)
        .bind(&result.file_key)
        .bind(result.file_size)
        .bind(&result.file_mime_type)
        .bind(result.processing_meta.as_ref().map(Json))
        .bind(result.passed_filter)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            "✅ Recording {} processed, now {}",
            id, result.processing_state
        );
        Ok(id)
    }

    /// Move a recording straight to `state`, bypassing the claim.
    pub async fn set_processing_state(&self, id: RecordingId, state: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let recording_type: Option<Option<String>> =
            sqlx::query_scalar("SELECT recording_type FROM recordings WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let recording_type = recording_type.ok_or(RecordingError::MissingRecording(id))?;

        validate_state(recording_type.as_deref(), state)?;

        sqlx::query("UPDATE recordings SET processing_state = ?, updated_at = ? WHERE id = ?")
            .bind(state)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Recording {} moved to {}", id, state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::recordings::UploadSource;
    use crate::db::{Device, Group, NewRecording, RecordingDatabase};
    use crate::recording::fields::RecordingInput;
    use crate::recording::lifecycle::FINISHED;
    use crate::recording::types::THERMAL_RAW;

    async fn seed(recording_types: &[&str]) -> (RecordingDatabase, Vec<RecordingId>) {
        let database = RecordingDatabase::in_memory().await.unwrap();
        let group_id = Group::create(database.pool(), "rangers").await.unwrap();
        let device_id = Device::create(database.pool(), "camera-01", Some(group_id))
            .await
            .unwrap();

        let mut conn = database.pool().acquire().await.unwrap();
        let mut ids = Vec::new();
        for (index, recording_type) in recording_types.iter().enumerate() {
            let source = UploadSource {
                group_id,
                device_id,
                raw_file_key: format!("raw/{index}"),
                raw_file_size: None,
            };
            let input = RecordingInput {
                recording_type: Some(recording_type.to_string()),
                ..Default::default()
            };
            let id = NewRecording::from_input(source, input)
                .save(&mut conn)
                .await
                .unwrap();
            ids.push(id);
        }
        drop(conn);
        (database, ids)
    }

    fn finished() -> ProcessingResult {
        ProcessingResult {
            processing_state: FINISHED.to_string(),
            file_key: Some("mp4/0".to_string()),
            file_size: Some(4096),
            file_mime_type: Some("video/mp4".to_string()),
            processing_meta: Some(serde_json::json!({"frames": 270})),
            passed_filter: Some(true),
        }
    }

    #[tokio::test]
    async fn test_claim_hands_out_each_recording_once() {
        let (database, ids) = seed(&[THERMAL_RAW, THERMAL_RAW, "audio"]).await;
        let queue = ProcessingQueue::new(database.pool().clone());

        let first = queue.claim_next(THERMAL_RAW, "toMp4").await.unwrap().unwrap();
        let second = queue.claim_next(THERMAL_RAW, "toMp4").await.unwrap().unwrap();
        assert_eq!(first.id, ids[0]);
        assert_eq!(second.id, ids[1]);
        assert_ne!(first.job_key, second.job_key);
        assert_eq!(first.raw_file_key.as_deref(), Some("raw/0"));

        assert!(queue.claim_next(THERMAL_RAW, "toMp4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_rejects_unknown_state() {
        let (database, _) = seed(&[THERMAL_RAW]).await;
        let queue = ProcessingQueue::new(database.pool().clone());

        let err = queue.claim_next(THERMAL_RAW, "toWav").await.unwrap_err();
        assert!(matches!(err, RecordingError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_complete_stores_output_and_releases_claim() {
        let (database, ids) = seed(&[THERMAL_RAW]).await;
        let queue = ProcessingQueue::new(database.pool().clone());

        let job = queue.claim_next(THERMAL_RAW, "toMp4").await.unwrap().unwrap();
        let job_key = job.job_key.clone().unwrap();
        assert_eq!(queue.job(&job_key).await.unwrap().unwrap().id, ids[0]);

        let id = queue.complete(&job_key, finished()).await.unwrap();
        assert_eq!(id, ids[0]);
        assert!(queue.job(&job_key).await.unwrap().is_none());

        let (state, mime, start): (Option<String>, Option<String>, Option<String>) =
            sqlx::query_as(
                "SELECT processing_state, file_mime_type, processing_start_time FROM recordings WHERE id = ?",
            )
            .bind(id)
            .fetch_one(database.pool())
            .await
            .unwrap();
        assert_eq!(state.as_deref(), Some(FINISHED));
        assert_eq!(mime.as_deref(), Some("video/mp4"));
        assert_eq!(start, None);

        // Reporting the same job twice is an error.
        assert!(matches!(
            queue.complete(&job_key, finished()).await,
            Err(RecordingError::UnknownJob(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_validates_state() {
        let (database, _) = seed(&[THERMAL_RAW]).await;
        let queue = ProcessingQueue::new(database.pool().clone());

        let job = queue.claim_next(THERMAL_RAW, "toMp4").await.unwrap().unwrap();
        let job_key = job.job_key.unwrap();
        let result = ProcessingResult {
            processing_state: "transcoded".to_string(),
            ..finished()
        };

        assert!(matches!(
            queue.complete(&job_key, result).await,
            Err(RecordingError::InvalidState { .. })
        ));
        // The claim survives a rejected report.
        assert!(queue.job(&job_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_processing_state() {
        let (database, ids) = seed(&[THERMAL_RAW, "audio"]).await;
        let queue = ProcessingQueue::new(database.pool().clone());

        queue.set_processing_state(ids[0], FINISHED).await.unwrap();
        assert!(queue.claim_next(THERMAL_RAW, "toMp4").await.unwrap().is_none());

        assert!(matches!(
            queue.set_processing_state(ids[1], FINISHED).await,
            Err(RecordingError::InvalidState { .. })
        ));
        assert!(matches!(
            queue.set_processing_state(9_999, FINISHED).await,
            Err(RecordingError::MissingRecording(9_999))
        ));
    }
}
