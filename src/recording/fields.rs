// Externally writable recording fields
//
// Ingestion and later user edits are governed by two different allow-lists.
// Payloads arrive as JSON objects keyed by the API field names; keys are
// checked against the relevant list before any value is parsed.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{RecordingError, Result};
use crate::recording::types::Location;

/// Fields an upload may populate.
pub const API_SETTABLE_FIELDS: &[&str] = &[
    "type",
    "duration",
    "recordingDateTime",
    "location",
    "version",
    "batteryCharging",
    "batteryLevel",
    "airplaneModeOn",
    "additionalMetadata",
    "processingMeta",
    "comment",
];

/// Fields a user may change after upload.
pub const API_UPDATABLE_FIELDS: &[&str] = &["location", "comment"];

fn check_fields(payload: &Map<String, Value>, allowed: &[&str]) -> Result<()> {
    match payload.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(field) => Err(RecordingError::InvalidField {
            field: field.clone(),
        }),
        None => Ok(()),
    }
}

pub fn check_settable(payload: &Map<String, Value>) -> Result<()> {
    check_fields(payload, API_SETTABLE_FIELDS)
}

pub fn check_updatable(updates: &Map<String, Value>) -> Result<()> {
    check_fields(updates, API_UPDATABLE_FIELDS)
}

/// Metadata supplied with an upload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingInput {
    #[serde(rename = "type")]
    pub recording_type: Option<String>,
    pub duration: Option<i64>,
    pub recording_date_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub location: Option<Location>,
    pub version: Option<String>,
    pub battery_charging: Option<String>,
    pub battery_level: Option<f64>,
    pub airplane_mode_on: Option<bool>,
    pub additional_metadata: Option<Value>,
    pub processing_meta: Option<Value>,
    pub comment: Option<String>,
}

impl RecordingInput {
    /// Validate an upload payload against the settable allow-list.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self> {
        check_settable(payload)?;

        let mut fields = payload.clone();
        let location = match fields.remove("location") {
            Some(value) => Location::from_json(&value)?,
            None => None,
        };

        let mut input: RecordingInput =
            serde_json::from_value(Value::Object(fields)).map_err(|e| {
                RecordingError::InvalidValue {
                    field: "payload".to_string(),
                    reason: e.to_string(),
                }
            })?;
        input.location = location;
        Ok(input)
    }
}

/// One validated change from a user update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Location(Option<Location>),
    Comment(Option<String>),
}

/// Validate an update payload against the updatable allow-list.
pub fn parse_updates(updates: &Map<String, Value>) -> Result<Vec<FieldChange>> {
    check_updatable(updates)?;

    updates
        .iter()
        .map(|(key, value)| match key.as_str() {
            "location" => Location::from_json(value).map(FieldChange::Location),
            "comment" => match value {
                Value::Null => Ok(FieldChange::Comment(None)),
                Value::String(comment) => Ok(FieldChange::Comment(Some(comment.clone()))),
                _ => Err(RecordingError::InvalidValue {
                    field: "comment".to_string(),
                    reason: "expected a string".to_string(),
                }),
            },
            other => Err(RecordingError::InvalidField {
                field: other.to_string(),
            }),
        })
        .collect()
}
