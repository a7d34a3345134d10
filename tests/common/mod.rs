#![allow(dead_code)]

use std::sync::Arc;

use recording_vault_lib::db::{Device, Group, RecordingDatabase, SqliteMembership, UploadSource};
use recording_vault_lib::recording::{DeviceId, GroupId, RecordingId, UserId};
use recording_vault_lib::{AccessConfig, RecordingService};
use serde_json::{json, Map, Value};

/// In-memory database with membership answered from the same store
pub struct Fixture {
    pub database: RecordingDatabase,
    pub service: RecordingService,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(AccessConfig::in_memory()).await
    }

    pub async fn with_config(config: AccessConfig) -> Self {
        let database = RecordingDatabase::in_memory().await.unwrap();
        let membership = Arc::new(SqliteMembership::new(database.pool().clone()));
        let service = RecordingService::new(&database, membership, config);
        Self { database, service }
    }

    pub async fn group(&self, name: &str) -> GroupId {
        Group::create(self.database.pool(), name).await.unwrap()
    }

    pub async fn device(&self, name: &str, group_id: GroupId) -> DeviceId {
        Device::create(self.database.pool(), name, Some(group_id))
            .await
            .unwrap()
    }

    pub async fn join_group(&self, user_id: UserId, group_id: GroupId) {
        Group::add_user(self.database.pool(), group_id, user_id)
            .await
            .unwrap();
    }

    pub async fn join_device(&self, user_id: UserId, device_id: DeviceId) {
        Device::add_user(self.database.pool(), device_id, user_id)
            .await
            .unwrap();
    }

    /// Upload a recording with `payload` as its metadata.
    pub async fn upload(&self, device_id: DeviceId, group_id: GroupId, payload: Value) -> RecordingId {
        let source = UploadSource {
            group_id,
            device_id,
            raw_file_key: format!("raw/{}", uuid::Uuid::new_v4()),
            raw_file_size: Some(1024),
        };
        self.service
            .create_from_input(source, &object(payload))
            .await
            .unwrap()
    }

    /// Upload a thermalRaw recording captured at `recorded_at`.
    pub async fn thermal(
        &self,
        device_id: DeviceId,
        group_id: GroupId,
        recorded_at: Option<&str>,
    ) -> RecordingId {
        let mut payload = json!({"type": "thermalRaw", "duration": 10});
        if let Some(recorded_at) = recorded_at {
            payload["recordingDateTime"] = json!(recorded_at);
        }
        self.upload(device_id, group_id, payload).await
    }

    pub async fn set_public(&self, id: RecordingId, public: bool) {
        sqlx::query("UPDATE recordings SET public = ? WHERE id = ?")
            .bind(public)
            .bind(id)
            .execute(self.database.pool())
            .await
            .unwrap();
    }

    pub async fn add_tag(&self, id: RecordingId, what: &str) {
        sqlx::query(
            "INSERT INTO tags (recording_id, what, automatic, created_at) VALUES (?, ?, 1, ?)",
        )
        .bind(id)
        .bind(what)
        .bind(chrono::Utc::now())
        .execute(self.database.pool())
        .await
        .unwrap();
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
