use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::access::MembershipProvider;
use crate::error::Result;
use crate::recording::types::{DeviceId, GroupId, User, UserId};

/// Group that owns devices and recordings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub group_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Field device that uploads recordings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    pub device_name: String,
    pub group_id: Option<GroupId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Group {
    /// Insert a group, returning its id
    pub async fn create(pool: &SqlitePool, group_name: &str) -> Result<GroupId> {
        let result = sqlx::query("INSERT INTO groups (group_name, created_at) VALUES (?, ?)")
            .bind(group_name)
            .bind(chrono::Utc::now())
            .execute(pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find(pool: &SqlitePool, id: GroupId) -> Result<Option<Self>> {
        let group = sqlx::query_as::<_, Self>(
            "SELECT id, group_name, created_at FROM groups WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(group)
    }

    /// Add a user to this group
    pub async fn add_user(pool: &SqlitePool, group_id: GroupId, user_id: UserId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO group_users (group_id, user_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

impl Device {
    /// Insert a device, returning its id
    pub async fn create(
        pool: &SqlitePool,
        device_name: &str,
        group_id: Option<GroupId>,
    ) -> Result<DeviceId> {
        let result = sqlx::query(
            "INSERT INTO devices (device_name, group_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(device_name)
        .bind(group_id)
        .bind(chrono::Utc::now())
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find(pool: &SqlitePool, id: DeviceId) -> Result<Option<Self>> {
        let device = sqlx::query_as::<_, Self>(
            "SELECT id, device_name, group_id, created_at FROM devices WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(device)
    }

    /// Associate a user directly with this device
    pub async fn add_user(pool: &SqlitePool, device_id: DeviceId, user_id: UserId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO device_users (device_id, user_id) VALUES (?, ?)")
            .bind(device_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

/// Membership lookups against the `group_users` and `device_users` tables
#[derive(Clone)]
pub struct SqliteMembership {
    pool: SqlitePool,
}

impl SqliteMembership {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipProvider for SqliteMembership {
    async fn group_ids_for(&self, user: &User) -> anyhow::Result<HashSet<GroupId>> {
        let ids: Vec<GroupId> =
            sqlx::query_scalar("SELECT group_id FROM group_users WHERE user_id = ?")
                .bind(user.id)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("Failed to load groups for user {}", user.id))?;

        Ok(ids.into_iter().collect())
    }

    async fn device_ids_for(&self, user: &User) -> anyhow::Result<HashSet<DeviceId>> {
        let ids: Vec<DeviceId> =
            sqlx::query_scalar("SELECT device_id FROM device_users WHERE user_id = ?")
                .bind(user.id)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("Failed to load devices for user {}", user.id))?;

        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RecordingDatabase;

    #[tokio::test]
    async fn test_membership_lookups() {
        let database = RecordingDatabase::in_memory().await.unwrap();
        let pool = database.pool();

        let rangers = Group::create(pool, "rangers").await.unwrap();
        let volunteers = Group::create(pool, "volunteers").await.unwrap();
        let camera = Device::create(pool, "camera-01", Some(volunteers)).await.unwrap();

        Group::add_user(pool, rangers, 1).await.unwrap();
        Group::add_user(pool, rangers, 1).await.unwrap();
        Device::add_user(pool, camera, 1).await.unwrap();
        Group::add_user(pool, volunteers, 2).await.unwrap();

        let membership = SqliteMembership::new(pool.clone());
        let user = User::new(1);
        assert_eq!(
            membership.group_ids_for(&user).await.unwrap(),
            HashSet::from([rangers])
        );
        assert_eq!(
            membership.device_ids_for(&user).await.unwrap(),
            HashSet::from([camera])
        );
        assert!(membership
            .device_ids_for(&User::new(2))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_find_group_and_device() {
        let database = RecordingDatabase::in_memory().await.unwrap();
        let pool = database.pool();

        let group_id = Group::create(pool, "rangers").await.unwrap();
        let device_id = Device::create(pool, "camera-01", Some(group_id)).await.unwrap();

        let group = Group::find(pool, group_id).await.unwrap().unwrap();
        assert_eq!(group.group_name, "rangers");

        let device = Device::find(pool, device_id).await.unwrap().unwrap();
        assert_eq!(device.device_name, "camera-01");
        assert_eq!(device.group_id, Some(group_id));

        assert!(Group::find(pool, 999).await.unwrap().is_none());
    }
}
