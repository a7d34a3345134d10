use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::membership::MembershipProvider;
use crate::error::Result;
use crate::recording::types::{Recording, User};

/// What a user may do with a single recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingPermissions {
    pub can_view: bool,
    pub can_delete: bool,
    pub can_tag: bool,
    pub can_update: bool,
}

impl RecordingPermissions {
    pub fn all() -> Self {
        Self {
            can_view: true,
            can_delete: true,
            can_tag: true,
            can_update: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Grants rights on a recording from group membership alone.
///
/// Membership of the owning group is necessary and sufficient for every
/// right. Seeing a recording through a device association or the public
/// flag grants none of them. This policy is provisional until public
/// recordings get their own permission levels.
#[derive(Clone)]
pub struct PermissionEvaluator {
    membership: Arc<dyn MembershipProvider>,
}

impl PermissionEvaluator {
    pub fn new(membership: Arc<dyn MembershipProvider>) -> Self {
        Self { membership }
    }

    pub async fn evaluate(&self, user: &User, recording: &Recording) -> Result<RecordingPermissions> {
        let group_ids = self.membership.group_ids_for(user).await?;

        let permissions = if group_ids.contains(&recording.group_id) {
            RecordingPermissions::all()
        } else {
            RecordingPermissions::none()
        };

        debug!(
            "Permissions for user {} on recording {}: {:?}",
            user.id, recording.id, permissions
        );
        Ok(permissions)
    }
}
