use std::collections::HashSet;

use async_trait::async_trait;

use crate::recording::types::{DeviceId, GroupId, User};

/// Source of a user's group and device associations.
///
/// Implementations may cache; callers treat both lookups as read-only and
/// bound them with their own timeouts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    async fn group_ids_for(&self, user: &User) -> anyhow::Result<HashSet<GroupId>>;

    async fn device_ids_for(&self, user: &User) -> anyhow::Result<HashSet<DeviceId>>;
}
