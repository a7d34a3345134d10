use std::sync::Arc;

use tracing::debug;

use super::membership::MembershipProvider;
use super::predicate::{Column, Predicate};
use crate::error::Result;
use crate::recording::types::User;

/// Builds the condition under which a recording is visible to a user:
/// public, owned by one of the user's groups, or produced by one of the
/// user's devices.
#[derive(Clone)]
pub struct VisibilityResolver {
    membership: Arc<dyn MembershipProvider>,
}

impl VisibilityResolver {
    pub fn new(membership: Arc<dyn MembershipProvider>) -> Self {
        Self { membership }
    }

    pub async fn predicate_for(&self, user: &User) -> Result<Predicate> {
        let (group_ids, device_ids) = tokio::try_join!(
            self.membership.group_ids_for(user),
            self.membership.device_ids_for(user),
        )?;

        debug!(
            "Visibility for user {}: {} groups, {} devices",
            user.id,
            group_ids.len(),
            device_ids.len()
        );

        let mut group_ids: Vec<_> = group_ids.into_iter().collect();
        let mut device_ids: Vec<_> = device_ids.into_iter().collect();
        // Stable parameter order keeps the generated SQL reproducible.
        group_ids.sort_unstable();
        device_ids.sort_unstable();

        Ok(Predicate::Or(vec![
            Predicate::eq(Column::Public, true),
            Predicate::is_in(Column::GroupId, group_ids),
            Predicate::is_in(Column::DeviceId, device_ids),
        ]))
    }
}
