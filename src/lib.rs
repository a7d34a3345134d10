pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod log;
pub mod recording;
pub mod recording_service;

// Re-export the service surface for external use
pub use access::{MembershipProvider, Outcome, Predicate, RecordingPermissions};
pub use config::AccessConfig;
pub use db::{RecordingDatabase, SqliteMembership, UploadSource};
pub use error::{RecordingError, Result};
pub use recording::{
    NewTag, OrderKey, OrderTerm, Recording, RecordingPage, RecordingQuery, RecordingView,
    TagFilter, User,
};
pub use recording_service::RecordingService;
