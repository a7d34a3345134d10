use crate::recording::types::RecordingId;

/// Errors surfaced by the recording access layer.
///
/// "Not found" and "not permitted" are deliberately absent: those collapse into
/// [`Outcome::Denied`](crate::access::Outcome) so callers cannot tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("Field '{field}' cannot be written through this operation")]
    InvalidField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid location (lat: {latitude}, lon: {longitude})")]
    InvalidLocation { latitude: f64, longitude: f64 },

    #[error("Processing state '{state}' is not valid for recording type '{recording_type}'")]
    InvalidState {
        recording_type: String,
        state: String,
    },

    #[error("No recording is claimed under job key {0}")]
    UnknownJob(String),

    #[error("Recording {0} does not exist")]
    MissingRecording(RecordingId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Membership lookup failed: {0}")]
    Membership(#[from] anyhow::Error),
}

impl RecordingError {
    /// Validation failures are rejected before any row is touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RecordingError::InvalidField { .. }
                | RecordingError::InvalidValue { .. }
                | RecordingError::InvalidLocation { .. }
                | RecordingError::InvalidState { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RecordingError>;
