// Recording module - data model, lifecycle and guarded access for device recordings
//
// - types: Row structs, attribute sets, ordering and filter enums
// - fields: Settable and updatable allow-lists, upload/update payload parsing
// - lifecycle: Per-type processing pipelines and state validation
// - filename_generation: Download file names in the display timezone
// - query_engine: Visibility-scoped listings and single fetches
// - mutation_guard: Permission-checked delete, update, tag and upload
// - processing: Claim/complete contract for transcoding workers

pub mod fields;
pub mod filename_generation;
pub mod lifecycle;
pub mod mutation_guard;
pub mod processing;
pub mod query_engine;
pub mod types;

// Re-export commonly used types for easier imports
pub use types::{
    AttributeSet, DeviceId, DeviceSummary, GroupId, GroupSummary, Location, NewTag, OrderKey,
    OrderTerm, Recording, RecordingId, RecordingView, SortDirection, Tag, TagFilter, TagId, User,
    UserId,
};

pub use fields::{FieldChange, RecordingInput, API_SETTABLE_FIELDS, API_UPDATABLE_FIELDS};
pub use lifecycle::{can_get_raw, validate_state, ProcessingPipeline};
pub use mutation_guard::MutationGuard;
pub use processing::{ProcessingJob, ProcessingQueue, ProcessingResult};
pub use query_engine::{QueryEngine, RecordingPage, RecordingQuery};
