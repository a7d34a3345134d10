use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::access::Predicate;
use crate::error::Result;
use crate::query_debug;
use crate::recording::fields::{FieldChange, RecordingInput};
use crate::recording::lifecycle;
use crate::recording::types::{
    AttributeSet, DeviceId, DeviceSummary, GroupId, GroupSummary, NewTag, OrderTerm, Recording,
    RecordingId, RecordingView, Tag, UserId,
};

const TAG_COLUMNS: &str =
    "id, recording_id, tagger_id, what, detail, confidence, start_time, duration, automatic, created_at";

const RECORDING_JOINS: &str = " FROM recordings \
     INNER JOIN devices ON devices.id = recordings.device_id \
     LEFT JOIN groups ON groups.id = recordings.group_id";

/// Where an upload came from. Ownership and the raw artifact are taken from
/// here, never from the uploaded metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSource {
    pub group_id: GroupId,
    pub device_id: DeviceId,
    pub raw_file_key: String,
    pub raw_file_size: Option<i64>,
}

/// Recording ready to be inserted
#[derive(Debug, Clone)]
pub struct NewRecording {
    pub group_id: GroupId,
    pub device_id: DeviceId,
    pub raw_file_key: String,
    pub raw_file_size: Option<i64>,
    pub processing_state: Option<String>,
    pub processing_meta: Option<serde_json::Value>,
    pub recording_type: Option<String>,
    pub duration: Option<i64>,
    pub recording_date_time: Option<chrono::DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub version: Option<String>,
    pub battery_level: Option<f64>,
    pub battery_charging: Option<String>,
    pub airplane_mode_on: Option<bool>,
    pub comment: Option<String>,
    pub additional_metadata: Option<serde_json::Value>,
    pub public: bool,
}

impl NewRecording {
    /// Combine validated upload metadata with its source. The processing
    /// state starts at the first state of the type's pipeline, if any.
    pub fn from_input(source: UploadSource, input: RecordingInput) -> Self {
        let processing_state = input
            .recording_type
            .as_deref()
            .and_then(lifecycle::initial_state)
            .map(str::to_string);

        Self {
            group_id: source.group_id,
            device_id: source.device_id,
            raw_file_key: source.raw_file_key,
            raw_file_size: source.raw_file_size,
            processing_state,
            processing_meta: input.processing_meta,
            recording_type: input.recording_type,
            duration: input.duration,
            recording_date_time: input.recording_date_time,
            latitude: input.location.map(|location| location.latitude),
            longitude: input.location.map(|location| location.longitude),
            version: input.version,
            battery_level: input.battery_level,
            battery_charging: input.battery_charging,
            airplane_mode_on: input.airplane_mode_on,
            comment: input.comment,
            additional_metadata: input.additional_metadata,
            public: false,
        }
    }

    /// Insert, returning the new recording id
    pub async fn save(&self, conn: &mut SqliteConnection) -> Result<RecordingId> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO recordings
             (group_id, device_id, raw_file_key, raw_file_size, processing_state, processing_meta,
              recording_type, duration, recording_date_time, latitude, longitude, version,
              battery_level, battery_charging, airplane_mode_on, comment, additional_metadata,
              public, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.group_id)
        .bind(self.device_id)
        .bind(&self.raw_file_key)
        .bind(self.raw_file_size)
        .bind(&self.processing_state)
        .bind(self.processing_meta.as_ref().map(Json))
        .bind(&self.recording_type)
        .bind(self.duration)
        .bind(self.recording_date_time)
        .bind(self.latitude)
        .bind(self.longitude)
        .bind(&self.version)
        .bind(self.battery_level)
        .bind(&self.battery_charging)
        .bind(self.airplane_mode_on)
        .bind(&self.comment)
        .bind(self.additional_metadata.as_ref().map(Json))
        .bind(self.public)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

/// Recording joined with the names of its group and device
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecordingRow {
    #[sqlx(flatten)]
    pub recording: Recording,
    pub group_name: Option<String>,
    pub device_name: String,
}

impl RecordingRow {
    pub fn into_view(self, tags: Vec<Tag>) -> RecordingView {
        let group = self.group_name.map(|group_name| GroupSummary {
            id: self.recording.group_id,
            group_name,
        });
        let device = DeviceSummary {
            id: self.recording.device_id,
            device_name: self.device_name,
        };

        RecordingView {
            recording: self.recording,
            group,
            device,
            tags,
        }
    }
}

fn select_rows(attributes: AttributeSet) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT ");
    builder.push(attributes.select_list());
    builder.push(", groups.group_name AS group_name, devices.device_name AS device_name");
    builder.push(RECORDING_JOINS);
    builder
}

/// One ordered page of recordings matching `predicate`.
///
/// A `limit` of `None` returns every row from `offset` on.
pub async fn fetch_page(
    conn: &mut SqliteConnection,
    attributes: AttributeSet,
    predicate: &Predicate,
    order: &[OrderTerm],
    offset: i64,
    limit: Option<i64>,
) -> Result<Vec<RecordingRow>> {
    let mut builder = select_rows(attributes);
    builder.push(" WHERE ");
    predicate.push_to(&mut builder);

    if !order.is_empty() {
        builder.push(" ORDER BY ");
        for (index, term) in order.iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            builder.push(term.key.as_sql());
            builder.push(" ");
            builder.push(term.direction.as_sql());
        }
    }

    // SQLite only accepts OFFSET after a LIMIT; -1 means no limit.
    builder.push(" LIMIT ");
    builder.push_bind(limit.unwrap_or(-1));
    builder.push(" OFFSET ");
    builder.push_bind(offset.max(0));

    query_debug!("Recording page query: {}", builder.sql());

    let rows = builder
        .build_query_as::<RecordingRow>()
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

/// Number of recordings matching `predicate`, ignoring paging.
pub async fn count_matching(conn: &mut SqliteConnection, predicate: &Predicate) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
    builder.push(RECORDING_JOINS);
    builder.push(" WHERE ");
    predicate.push_to(&mut builder);

    query_debug!("Recording count query: {}", builder.sql());

    let count = builder
        .build_query_scalar::<i64>()
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// A single recording, if it exists and matches `predicate`.
pub async fn fetch_one(
    conn: &mut SqliteConnection,
    attributes: AttributeSet,
    id: RecordingId,
    predicate: &Predicate,
) -> Result<Option<RecordingRow>> {
    let mut builder = select_rows(attributes);
    builder.push(" WHERE recordings.id = ");
    builder.push_bind(id);
    builder.push(" AND (");
    predicate.push_to(&mut builder);
    builder.push(")");

    query_debug!("Single recording query: {}", builder.sql());

    let row = builder
        .build_query_as::<RecordingRow>()
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

/// Tags of every listed recording, grouped by recording id.
pub async fn tags_for(
    conn: &mut SqliteConnection,
    recording_ids: &[RecordingId],
) -> Result<HashMap<RecordingId, Vec<Tag>>> {
    let mut grouped: HashMap<RecordingId, Vec<Tag>> = HashMap::new();
    if recording_ids.is_empty() {
        return Ok(grouped);
    }

    let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");
    builder.push(TAG_COLUMNS);
    builder.push(" FROM tags WHERE recording_id IN (");
    let mut separated = builder.separated(", ");
    for id in recording_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id ASC");

    let tags = builder.build_query_as::<Tag>().fetch_all(&mut *conn).await?;
    for tag in tags {
        grouped.entry(tag.recording_id).or_default().push(tag);
    }
    Ok(grouped)
}

/// Delete `id` only while it still belongs to `group_id`.
pub async fn delete_owned(
    conn: &mut SqliteConnection,
    id: RecordingId,
    group_id: GroupId,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM recordings WHERE id = ? AND group_id = ?")
        .bind(id)
        .bind(group_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Apply `changes` to `id` only while it still belongs to `group_id`.
pub async fn update_owned(
    conn: &mut SqliteConnection,
    id: RecordingId,
    group_id: GroupId,
    changes: &[FieldChange],
) -> Result<bool> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE recordings SET ");
    let mut assignments = builder.separated(", ");
    for change in changes {
        match change {
            FieldChange::Location(location) => {
                assignments.push("latitude = ");
                assignments.push_bind_unseparated(location.map(|l| l.latitude));
                assignments.push("longitude = ");
                assignments.push_bind_unseparated(location.map(|l| l.longitude));
            }
            FieldChange::Comment(comment) => {
                assignments.push("comment = ");
                assignments.push_bind_unseparated(comment.clone());
            }
        }
    }
    assignments.push("updated_at = ");
    assignments.push_bind_unseparated(Utc::now());

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" AND group_id = ");
    builder.push_bind(group_id);

    query_debug!("Recording update: {}", builder.sql());

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Attach a tag to `recording_id`.
pub async fn insert_tag(
    conn: &mut SqliteConnection,
    recording_id: RecordingId,
    tagger_id: Option<UserId>,
    tag: &NewTag,
) -> Result<Tag> {
    let sql = format!(
        "INSERT INTO tags
         (recording_id, tagger_id, what, detail, confidence, start_time, duration, automatic, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {TAG_COLUMNS}"
    );
    let tag = sqlx::query_as::<_, Tag>(&sql)
        .bind(recording_id)
        .bind(tagger_id)
        .bind(&tag.what)
        .bind(&tag.detail)
        .bind(tag.confidence)
        .bind(tag.start_time)
        .bind(tag.duration)
        .bind(tag.automatic)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

    Ok(tag)
}
