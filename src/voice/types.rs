//! Voice capture state and engine event types.

use super::VoiceError;
use serde::{Deserialize, Serialize};

/// Capture phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoicePhase {
    /// Not capturing
    #[default]
    Idle,
    /// Waiting on the microphone permission prompt
    RequestingPermission,
    /// Engine is running and may emit results
    Listening,
    /// A start attempt failed; settles back to idle immediately
    Erroring,
}

impl VoicePhase {
    pub fn is_listening(&self) -> bool {
        matches!(self, VoicePhase::Listening)
    }
}

impl std::fmt::Display for VoicePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoicePhase::Idle => write!(f, "Idle"),
            VoicePhase::RequestingPermission => write!(f, "Requesting permission"),
            VoicePhase::Listening => write!(f, "Listening"),
            VoicePhase::Erroring => write!(f, "Error"),
        }
    }
}

/// Observable voice capture state.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VoiceState {
    pub phase: VoicePhase,
    pub transcript: String,
    pub error: Option<VoiceError>,
    pub is_supported: bool,
}

/// One recognition hypothesis as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub transcript: String,
    #[serde(default)]
    pub is_final: bool,
}

/// Callbacks from the speech engine, posted to the capture owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Result {
        #[serde(default)]
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    Error {
        code: String,
    },
    End,
}

/// Engine configuration, applied on every start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionConfig {
    pub language: String,
    /// Stop after one utterance
    pub continuous: bool,
    pub interim_results: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: false,
            interim_results: true,
        }
    }
}

impl RecognitionConfig {
    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }
}

/// Collapse one result event into transcript text. Finalized text wins over
/// interim hypotheses from the same event.
pub fn merge_results(result_index: usize, results: &[RecognitionResult]) -> String {
    let mut finals = String::new();
    let mut interim = String::new();
    for result in results.iter().skip(result_index) {
        if result.is_final {
            finals.push_str(&result.transcript);
            finals.push(' ');
        } else {
            interim.push_str(&result.transcript);
        }
    }
    if finals.is_empty() {
        interim
    } else {
        finals.trim_end().to_string()
    }
}
