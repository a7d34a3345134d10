// Processing lifecycle for recordings
//
// Each recording type with a transcoding pipeline has an ordered list of
// processing states. The transcoding worker moves a recording along the list;
// this module only decides which states are legal for a type.

use tracing::warn;

use crate::error::{RecordingError, Result};
use crate::recording::types::{Recording, THERMAL_RAW};

/// Ordered processing states of one recording type. The last state is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingPipeline {
    pub recording_type: &'static str,
    pub states: &'static [&'static str],
}

pub const THERMAL_RAW_STATES: &[&str] = &["toMp4", "FINISHED"];

pub const FINISHED: &str = "FINISHED";

/// Every type with a transcoding pipeline.
pub const PIPELINES: &[ProcessingPipeline] = &[ProcessingPipeline {
    recording_type: THERMAL_RAW,
    states: THERMAL_RAW_STATES,
}];

impl ProcessingPipeline {
    pub fn for_type(recording_type: &str) -> Option<&'static ProcessingPipeline> {
        PIPELINES
            .iter()
            .find(|pipeline| pipeline.recording_type == recording_type)
    }

    pub fn initial_state(&self) -> &'static str {
        self.states[0]
    }

    pub fn terminal_state(&self) -> &'static str {
        self.states[self.states.len() - 1]
    }

    pub fn contains(&self, state: &str) -> bool {
        self.states.contains(&state)
    }

    /// The state after `state`, or `None` once terminal or unknown.
    pub fn next_state(&self, state: &str) -> Option<&'static str> {
        let position = self.states.iter().position(|s| *s == state)?;
        self.states.get(position + 1).copied()
    }
}

/// States defined for `recording_type`; `None` if the type has no pipeline.
pub fn processing_states(recording_type: &str) -> Option<&'static [&'static str]> {
    ProcessingPipeline::for_type(recording_type).map(|pipeline| pipeline.states)
}

/// State a new recording of this type starts in.
pub fn initial_state(recording_type: &str) -> Option<&'static str> {
    ProcessingPipeline::for_type(recording_type).map(ProcessingPipeline::initial_state)
}

pub fn is_terminal(recording_type: &str, state: &str) -> bool {
    ProcessingPipeline::for_type(recording_type)
        .map(|pipeline| pipeline.terminal_state() == state)
        .unwrap_or(false)
}

pub fn next_state(recording_type: &str, state: &str) -> Option<&'static str> {
    ProcessingPipeline::for_type(recording_type)?.next_state(state)
}

/// Reject `state` unless it belongs to the pipeline of `recording_type`.
/// Types without a pipeline accept no state at all.
pub fn validate_state(recording_type: Option<&str>, state: &str) -> Result<()> {
    let valid = recording_type
        .and_then(ProcessingPipeline::for_type)
        .map(|pipeline| pipeline.contains(state))
        .unwrap_or(false);

    if !valid {
        warn!(
            "Rejected processing state '{}' for recording type {:?}",
            state, recording_type
        );
        return Err(RecordingError::InvalidState {
            recording_type: recording_type.unwrap_or_default().to_string(),
            state: state.to_string(),
        });
    }
    Ok(())
}

/// Raw downloads are only offered for types whose raw format is known.
pub fn can_get_raw(recording: &Recording) -> bool {
    recording.is_type(THERMAL_RAW)
}
