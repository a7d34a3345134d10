// Guarded writes
//
// A mutation only happens when the recording is visible to the user and the
// user holds the matching right. Every failure along that path yields the
// same `Outcome::Denied`, so callers learn nothing about records they cannot
// see. The final statement is conditioned on the group id the permission
// check saw; a recording that changed owner in between is left untouched.

use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::access::{Outcome, PermissionEvaluator, RecordingPermissions};
use crate::db::recordings::{self, NewRecording, UploadSource};
use crate::error::{RecordingError, Result};
use crate::recording::fields::{parse_updates, RecordingInput};
use crate::recording::query_engine::QueryEngine;
use crate::recording::types::{NewTag, Recording, RecordingId, Tag, User};

#[derive(Clone)]
pub struct MutationGuard {
    pool: SqlitePool,
    queries: QueryEngine,
    permissions: PermissionEvaluator,
}

impl MutationGuard {
    pub fn new(pool: SqlitePool, queries: QueryEngine, permissions: PermissionEvaluator) -> Self {
        Self {
            pool,
            queries,
            permissions,
        }
    }

    /// Fetch `id` if visible and pass it through `allowed`; `None` when
    /// either check fails.
    async fn authorized(
        &self,
        user: &User,
        id: RecordingId,
        action: &str,
        allowed: impl Fn(&RecordingPermissions) -> bool,
    ) -> Result<Option<Recording>> {
        let Some(recording) = self.queries.visible_recording(user, id).await? else {
            return Ok(None);
        };

        let permissions = self.permissions.evaluate(user, &recording).await?;
        if !allowed(&permissions) {
            warn!(
                "🚫 User {} may not {} recording {}",
                user.id, action, recording.id
            );
            return Ok(None);
        }
        Ok(Some(recording))
    }

    pub async fn try_delete_one(&self, user: &User, id: RecordingId) -> Result<Outcome<()>> {
        let Some(recording) = self
            .authorized(user, id, "delete", |p| p.can_delete)
            .await?
        else {
            return Ok(Outcome::Denied);
        };

        let mut tx = self.pool.begin().await?;
        let deleted = recordings::delete_owned(&mut *tx, recording.id, recording.group_id).await?;
        tx.commit().await?;

        if !deleted {
            return Ok(Outcome::Denied);
        }
        info!("🗑️  User {} deleted recording {}", user.id, id);
        Ok(Outcome::Ok(()))
    }

    /// `true` when the recording was removed.
    pub async fn delete_one(&self, user: &User, id: RecordingId) -> Result<bool> {
        Ok(self.try_delete_one(user, id).await?.is_ok())
    }

    /// Update with every failure cause kept apart. Disallowed fields and
    /// malformed values are errors raised before the recording is looked up.
    pub async fn try_update_one(
        &self,
        user: &User,
        id: RecordingId,
        updates: &Map<String, Value>,
    ) -> Result<Outcome<()>> {
        let changes = parse_updates(updates)?;

        let Some(recording) = self
            .authorized(user, id, "update", |p| p.can_update)
            .await?
        else {
            return Ok(Outcome::Denied);
        };

        let mut tx = self.pool.begin().await?;
        let updated =
            recordings::update_owned(&mut *tx, recording.id, recording.group_id, &changes).await?;
        tx.commit().await?;

        if !updated {
            return Ok(Outcome::Denied);
        }
        info!(
            "✏️  User {} updated {} field(s) on recording {}",
            user.id,
            changes.len(),
            id
        );
        Ok(Outcome::Ok(()))
    }

    /// `true` when the update was applied. A field outside the updatable
    /// allow-list is reported as `false`, like a missing recording.
    pub async fn update_one(
        &self,
        user: &User,
        id: RecordingId,
        updates: &Map<String, Value>,
    ) -> Result<bool> {
        match self.try_update_one(user, id, updates).await {
            Ok(outcome) => Ok(outcome.is_ok()),
            Err(RecordingError::InvalidField { field }) => {
                warn!("Rejected update of recording {}: field '{}'", id, field);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Attach a tag on behalf of `user`; requires the tag right.
    pub async fn tag_one(&self, user: &User, id: RecordingId, tag: NewTag) -> Result<Outcome<Tag>> {
        let Some(recording) = self.authorized(user, id, "tag", |p| p.can_tag).await? else {
            return Ok(Outcome::Denied);
        };

        let mut conn = self.pool.acquire().await?;
        let tag = recordings::insert_tag(&mut conn, recording.id, Some(user.id), &tag).await?;
        info!("🏷️  User {} tagged recording {}", user.id, id);
        Ok(Outcome::Ok(tag))
    }

    /// Store an upload. Ownership comes from `source`; `payload` may only
    /// carry settable fields.
    pub async fn create_from_input(
        &self,
        source: UploadSource,
        payload: &Map<String, Value>,
    ) -> Result<RecordingId> {
        let input = RecordingInput::from_payload(payload)?;
        let recording = NewRecording::from_input(source, input);

        let mut conn = self.pool.acquire().await?;
        let id = recording.save(&mut conn).await?;
        info!(
            "📥 Stored recording {} from device {} ({:?})",
            id, recording.device_id, recording.recording_type
        );
        Ok(id)
    }
}
