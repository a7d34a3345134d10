// Core recording types
//
// Row structs for recordings and their associations, the attribute sets that
// decide which columns each view exposes, and the ordering/filter enums used
// by the query engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::error::{RecordingError, Result};

pub type RecordingId = i64;
pub type GroupId = i64;
pub type DeviceId = i64;
pub type UserId = i64;
pub type TagId = i64;

/// Recording type with a transcoding pipeline.
pub const THERMAL_RAW: &str = "thermalRaw";
pub const MP4_MIME_TYPE: &str = "video/mp4";

/// The user a request is made on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self { id }
    }
}

/// Recording row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: RecordingId,
    pub group_id: GroupId,
    pub device_id: DeviceId,

    // Raw upload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_file_key: Option<String>,
    pub raw_file_size: Option<i64>,

    // Processing output
    pub file_key: Option<String>,
    pub file_size: Option<i64>,
    pub file_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_meta: Option<Json<serde_json::Value>>,
    pub processing_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed_filter: Option<bool>,

    // Recording metadata
    #[serde(rename = "type")]
    pub recording_type: Option<String>,
    pub duration: Option<i64>,
    pub recording_date_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub version: Option<String>,
    pub battery_level: Option<f64>,
    pub battery_charging: Option<String>,
    pub airplane_mode_on: Option<bool>,
    pub comment: Option<String>,
    pub additional_metadata: Option<Json<serde_json::Value>>,

    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recording {
    pub fn location(&self) -> Option<Location> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub fn is_type(&self, recording_type: &str) -> bool {
        self.recording_type.as_deref() == Some(recording_type)
    }

    /// A processed artifact exists once the transcoder stored its file.
    pub fn has_processed_file(&self) -> bool {
        self.file_key.is_some()
    }
}

/// Validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(RecordingError::InvalidLocation {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parse `[lat, lon]` or `{"latitude": .., "longitude": ..}`; `null`
    /// clears the location.
    pub fn from_json(value: &serde_json::Value) -> Result<Option<Self>> {
        use serde_json::Value;

        let coordinates = match value {
            Value::Null => return Ok(None),
            Value::Array(items) if items.len() == 2 => (items[0].as_f64(), items[1].as_f64()),
            Value::Object(fields) => (
                fields.get("latitude").and_then(Value::as_f64),
                fields.get("longitude").and_then(Value::as_f64),
            ),
            _ => (None, None),
        };

        match coordinates {
            (Some(latitude), Some(longitude)) => Location::new(latitude, longitude).map(Some),
            _ => Err(RecordingError::InvalidValue {
                field: "location".to_string(),
                reason: "expected [latitude, longitude]".to_string(),
            }),
        }
    }
}

/// Tag attached to a recording
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    pub recording_id: RecordingId,
    pub tagger_id: Option<UserId>,
    pub what: Option<String>,
    pub detail: Option<String>,
    pub confidence: Option<f64>,
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
    pub automatic: bool,
    pub created_at: DateTime<Utc>,
}

/// Tag as submitted by a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTag {
    pub what: Option<String>,
    pub detail: Option<String>,
    pub confidence: Option<f64>,
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
    #[serde(default)]
    pub automatic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: GroupId,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub device_name: String,
}

/// A recording with its eagerly loaded associations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingView {
    #[serde(flatten)]
    pub recording: Recording,
    pub group: Option<GroupSummary>,
    pub device: DeviceSummary,
    pub tags: Vec<Tag>,
}

/// Every column of the `recordings` table, in row-struct order.
pub const RECORDING_COLUMNS: &[&str] = &[
    "id",
    "group_id",
    "device_id",
    "raw_file_key",
    "raw_file_size",
    "file_key",
    "file_size",
    "file_mime_type",
    "processing_start_time",
    "processing_meta",
    "processing_state",
    "job_key",
    "passed_filter",
    "recording_type",
    "duration",
    "recording_date_time",
    "latitude",
    "longitude",
    "version",
    "battery_level",
    "battery_charging",
    "airplane_mode_on",
    "comment",
    "additional_metadata",
    "public",
    "created_at",
    "updated_at",
];

/// Columns returned by user-facing listings. `raw_file_key` is never listed.
pub const USER_GET_ATTRIBUTES: &[&str] = &[
    "id",
    "group_id",
    "device_id",
    "raw_file_size",
    "file_key",
    "file_size",
    "file_mime_type",
    "processing_state",
    "recording_type",
    "duration",
    "recording_date_time",
    "latitude",
    "longitude",
    "version",
    "battery_level",
    "battery_charging",
    "airplane_mode_on",
    "comment",
    "additional_metadata",
    "public",
    "created_at",
    "updated_at",
];

/// Columns handed to the transcoding worker.
pub const PROCESSING_ATTRIBUTES: &[&str] = &[
    "id",
    "raw_file_key",
    "file_key",
    "processing_meta",
    "processing_state",
    "job_key",
    "recording_type",
];

/// Which columns a fetch exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSet {
    /// Listing view
    UserListing,
    /// Single-record view, adds `raw_file_key`
    UserSingle,
}

impl AttributeSet {
    fn includes(self, column: &str) -> bool {
        USER_GET_ATTRIBUTES.contains(&column)
            || (self == AttributeSet::UserSingle && column == "raw_file_key")
    }

    /// SELECT list for `recordings`; hidden columns come back as NULL so a
    /// single row struct serves every view.
    pub fn select_list(self) -> String {
        RECORDING_COLUMNS
            .iter()
            .map(|column| {
                if self.includes(column) {
                    format!("recordings.{column} AS {column}")
                } else {
                    format!("NULL AS {column}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Tri-state tag presence filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TagFilter {
    #[default]
    Any,
    TaggedOnly,
    UntaggedOnly,
}

impl From<Option<bool>> for TagFilter {
    fn from(tagged_only: Option<bool>) -> Self {
        match tagged_only {
            Some(true) => TagFilter::TaggedOnly,
            Some(false) => TagFilter::UntaggedOnly,
            None => TagFilter::Any,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sortable expressions over recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKey {
    Id,
    /// `recording_date_time`, missing values count as the epoch
    RecordingDateTime,
    Duration,
    RecordingType,
    ProcessingState,
    CreatedAt,
}

impl OrderKey {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderKey::Id => "recordings.id",
            OrderKey::RecordingDateTime => {
                "COALESCE(julianday(recordings.recording_date_time), julianday('1970-01-01'))"
            }
            OrderKey::Duration => "recordings.duration",
            OrderKey::RecordingType => "recordings.recording_type",
            OrderKey::ProcessingState => "recordings.processing_state",
            OrderKey::CreatedAt => "julianday(recordings.created_at)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub key: OrderKey,
    pub direction: SortDirection,
}

impl OrderTerm {
    pub fn desc(key: OrderKey) -> Self {
        Self {
            key,
            direction: SortDirection::Desc,
        }
    }

    pub fn asc(key: OrderKey) -> Self {
        Self {
            key,
            direction: SortDirection::Asc,
        }
    }
}

#[cfg(test)]
impl Recording {
    /// Unsaved thermalRaw recording waiting for transcoding.
    pub(crate) fn fixture(id: RecordingId, group_id: GroupId, device_id: DeviceId) -> Self {
        let now = Utc::now();
        Recording {
            id,
            group_id,
            device_id,
            raw_file_key: Some(format!("raw/{id}")),
            raw_file_size: Some(1024),
            file_key: None,
            file_size: None,
            file_mime_type: None,
            processing_start_time: None,
            processing_meta: None,
            processing_state: Some("toMp4".to_string()),
            job_key: None,
            passed_filter: None,
            recording_type: Some(THERMAL_RAW.to_string()),
            duration: Some(10),
            recording_date_time: None,
            latitude: None,
            longitude: None,
            version: None,
            battery_level: None,
            battery_charging: None,
            airplane_mode_on: None,
            comment: None,
            additional_metadata: None,
            public: false,
            created_at: now,
            updated_at: now,
        }
    }
}
