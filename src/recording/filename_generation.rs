// Download file names for recordings
//
// Names are the capture time rendered in the configured display timezone
// followed by an extension chosen from the recording type and whatever the
// transcoder has produced so far.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::recording::types::{Recording, MP4_MIME_TYPE, THERMAL_RAW};

/// `YYYYMMDD-HHmmss`
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

pub const CPTV_EXTENSION: &str = ".cptv";
pub const MP4_EXTENSION: &str = ".mp4";

/// Render `time` (or now) in `timezone`.
pub fn format_timestamp(time: Option<DateTime<Utc>>, timezone: Tz) -> String {
    time.unwrap_or_else(Utc::now)
        .with_timezone(&timezone)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Extension for the file currently served for `recording`.
pub fn file_extension(recording: &Recording) -> &'static str {
    if recording.file_mime_type.as_deref() == Some(MP4_MIME_TYPE) {
        MP4_EXTENSION
    } else if recording.is_type(THERMAL_RAW) && !recording.has_processed_file() {
        CPTV_EXTENSION
    } else {
        ""
    }
}

/// Extension for the raw upload of `recording`.
pub fn raw_file_extension(recording: &Recording) -> &'static str {
    if recording.is_type(THERMAL_RAW) {
        CPTV_EXTENSION
    } else {
        ""
    }
}

pub fn file_name(recording: &Recording, timezone: Tz) -> String {
    let name = format!(
        "{}{}",
        format_timestamp(recording.recording_date_time, timezone),
        file_extension(recording)
    );
    debug!("File name for recording {}: {}", recording.id, name);
    name
}

/// Name for the raw upload. Stamped with the capture time like
/// [`file_name`], so both downloads of one recording share a timestamp.
pub fn raw_file_name(recording: &Recording, timezone: Tz) -> String {
    format!(
        "{}{}",
        format_timestamp(recording.recording_date_time, timezone),
        raw_file_extension(recording)
    )
}
