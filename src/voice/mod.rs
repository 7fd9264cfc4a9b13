//! Voice input
//!
//! Wraps a platform speech recognizer behind a start/stop/reset contract.
//!
//! Architecture:
//! - VoiceCapture: owner task, the only writer of capture state
//! - VoiceHandle: cloneable command front door, exposes state via `watch`
//! - EngineEventSink: where the platform engine posts result/error/end callbacks
//! - SpeechEngine: the platform capability (microphone gate + recognizer)
//!
//! Commands and engine callbacks share one FIFO queue, so a `snapshot()`
//! issued after posting an event always observes that event.

mod capture;
mod engine;
mod error;
mod types;


pub use capture::{VoiceCapture, VoiceHandle};
pub use engine::{EngineEventSink, SpeechEngine};
pub use error::VoiceError;
pub use types::{
    merge_results, EngineEvent, RecognitionConfig, RecognitionResult, VoicePhase, VoiceState,
};
