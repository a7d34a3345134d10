// Access control for recordings
//
// Visibility decides which recordings a user can see at all; permissions
// decide what they may do to one they can see. The two are deliberately
// not the same rule.

pub mod membership;
pub mod outcome;
pub mod permissions;
pub mod predicate;
pub mod visibility;

pub use membership::MembershipProvider;
pub use outcome::Outcome;
pub use permissions::{PermissionEvaluator, RecordingPermissions};
pub use predicate::{Column, CompareOp, Fragment, Predicate, Value};
pub use visibility::VisibilityResolver;
