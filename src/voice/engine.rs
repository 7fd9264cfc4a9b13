use super::capture::VoiceMessage;
use super::types::{EngineEvent, RecognitionConfig};
use super::VoiceError;
use async_trait::async_trait;
use tokio::sync::mpsc::WeakUnboundedSender;

/// Platform speech recognition plus the microphone permission gate.
///
/// Implementations report results, errors and end-of-capture through the
/// [`EngineEventSink`] handed out by the capture owner; they never touch
/// capture state directly.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Probed once when the capture owner is created.
    fn is_supported(&self) -> bool;

    /// Ask for microphone access. A single yes/no outcome.
    async fn request_microphone(&self) -> bool;

    fn release_microphone(&self);

    fn start(&self, config: &RecognitionConfig) -> Result<(), VoiceError>;

    /// Ask the engine to finalize. An `End` event follows asynchronously.
    fn stop(&self);
}

/// Where engine callbacks are posted. Holds only a weak reference to the
/// owner's queue, so a live sink never keeps a torn-down capture alive.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    pub(crate) tx: WeakUnboundedSender<VoiceMessage>,
}

impl EngineEventSink {
    /// Returns false once the capture owner has shut down.
    pub fn post(&self, event: EngineEvent) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.send(VoiceMessage::Engine(event)).is_ok(),
            None => {
                log::debug!("[voice] dropping engine event after shutdown: {:?}", event);
                false
            }
        }
    }
}
