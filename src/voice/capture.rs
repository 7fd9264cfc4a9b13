//! The capture owner: a single task that serializes user commands and engine
//! callbacks through one queue and is the only writer of [`VoiceState`].

use super::engine::{EngineEventSink, SpeechEngine};
use super::types::{merge_results, EngineEvent, RecognitionConfig, VoicePhase, VoiceState};
use super::VoiceError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Debug)]
pub(crate) enum VoiceMessage {
    Start(oneshot::Sender<Result<(), VoiceError>>),
    Stop,
    Reset,
    Snapshot(oneshot::Sender<VoiceState>),
    Engine(EngineEvent),
}

/// Owner of the capture state machine. Create it, hand out
/// [`VoiceHandle`]s and an [`EngineEventSink`], then drive it with
/// [`VoiceCapture::run`] on the async runtime.
pub struct VoiceCapture {
    engine: Arc<dyn SpeechEngine>,
    config: RecognitionConfig,
    tx: Option<mpsc::UnboundedSender<VoiceMessage>>,
    weak_tx: mpsc::WeakUnboundedSender<VoiceMessage>,
    rx: mpsc::UnboundedReceiver<VoiceMessage>,
    publisher: watch::Sender<VoiceState>,
    state: VoiceState,
    mic_held: bool,
}

impl VoiceCapture {
    pub fn new(engine: Arc<dyn SpeechEngine>, config: RecognitionConfig) -> Self {
        let is_supported = engine.is_supported();
        let state = VoiceState {
            is_supported,
            error: (!is_supported).then_some(VoiceError::UnsupportedCapability),
            ..VoiceState::default()
        };
        if !is_supported {
            log::warn!("[voice] speech recognition unavailable on this platform");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let (publisher, _) = watch::channel(state.clone());
        Self {
            engine,
            config,
            weak_tx: tx.downgrade(),
            tx: Some(tx),
            rx,
            publisher,
            state,
            mic_held: false,
        }
    }

    pub fn handle(&self) -> VoiceHandle {
        VoiceHandle {
            tx: self.tx.clone(),
            state: self.publisher.subscribe(),
        }
    }

    pub fn sink(&self) -> EngineEventSink {
        EngineEventSink {
            tx: self.weak_tx.clone(),
        }
    }

    /// Process messages until every [`VoiceHandle`] is gone, then release the
    /// microphone if a capture was still running.
    pub async fn run(mut self) {
        self.tx = None;
        while let Some(message) = self.rx.recv().await {
            match message {
                VoiceMessage::Start(reply) => {
                    let result = self.start().await;
                    let _ = reply.send(result);
                }
                VoiceMessage::Stop => self.stop(),
                VoiceMessage::Reset => self.reset(),
                VoiceMessage::Snapshot(reply) => {
                    let _ = reply.send(self.state.clone());
                }
                VoiceMessage::Engine(event) => self.on_engine_event(event),
            }
        }
        self.shutdown();
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }

    fn set_phase(&mut self, phase: VoicePhase) {
        if self.state.phase != phase {
            log::debug!("[voice] {} -> {}", self.state.phase, phase);
        }
        self.state.phase = phase;
        self.publish();
    }

    fn release_microphone(&mut self) {
        if self.mic_held {
            self.engine.release_microphone();
            self.mic_held = false;
        }
    }

    async fn start(&mut self) -> Result<(), VoiceError> {
        if !self.state.is_supported {
            self.state.error = Some(VoiceError::UnsupportedCapability);
            self.publish();
            return Err(VoiceError::UnsupportedCapability);
        }
        if self.state.phase != VoicePhase::Idle {
            log::debug!("[voice] start ignored while {}", self.state.phase);
            return Ok(());
        }

        self.set_phase(VoicePhase::RequestingPermission);
        if !self.engine.request_microphone().await {
            log::warn!("[voice] microphone permission denied");
            return Err(self.fail_start(VoiceError::PermissionDenied));
        }
        self.mic_held = true;

        self.state.transcript.clear();
        self.state.error = None;
        if let Err(err) = self.engine.start(&self.config) {
            log::error!("[voice] engine failed to start: {}", err);
            self.release_microphone();
            return Err(self.fail_start(err));
        }
        self.set_phase(VoicePhase::Listening);
        Ok(())
    }

    fn fail_start(&mut self, err: VoiceError) -> VoiceError {
        self.state.error = Some(err.clone());
        self.set_phase(VoicePhase::Erroring);
        self.set_phase(VoicePhase::Idle);
        err
    }

    fn stop(&mut self) {
        if self.state.phase.is_listening() {
            self.engine.stop();
        }
    }

    fn reset(&mut self) {
        self.state.transcript.clear();
        self.state.error = None;
        self.publish();
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Result {
                result_index,
                results,
            } => {
                if !self.state.phase.is_listening() {
                    log::debug!("[voice] result ignored while {}", self.state.phase);
                    return;
                }
                self.state.transcript = merge_results(result_index, &results);
                self.publish();
            }
            EngineEvent::Error { code } => {
                let err = VoiceError::from_code(&code);
                log::warn!("[voice] speech recognition error {:?}: {}", code, err);
                self.state.error = Some(err);
                self.release_microphone();
                self.set_phase(VoicePhase::Idle);
            }
            EngineEvent::End => {
                self.release_microphone();
                self.set_phase(VoicePhase::Idle);
            }
        }
    }

    fn shutdown(&mut self) {
        if self.state.phase.is_listening() {
            log::info!("[voice] capture torn down while listening, stopping engine");
            self.engine.stop();
        }
        self.release_microphone();
        self.state.phase = VoicePhase::Idle;
        self.publish();
    }
}

/// Cloneable front door to a running [`VoiceCapture`].
#[derive(Debug, Clone)]
pub struct VoiceHandle {
    tx: Option<mpsc::UnboundedSender<VoiceMessage>>,
    state: watch::Receiver<VoiceState>,
}

impl VoiceHandle {
    /// Build a capture owner and spawn it on the current tokio runtime.
    pub fn spawn(
        engine: Arc<dyn SpeechEngine>,
        config: RecognitionConfig,
    ) -> (Self, EngineEventSink) {
        let capture = VoiceCapture::new(engine, config);
        let handle = capture.handle();
        let sink = capture.sink();
        tokio::spawn(capture.run());
        (handle, sink)
    }

    fn post(&self, message: VoiceMessage) -> bool {
        match &self.tx {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.state.borrow().is_supported
    }

    /// Request the microphone and begin listening. A no-op while a capture
    /// is already running.
    pub async fn start(&self) -> Result<(), VoiceError> {
        let (reply, response) = oneshot::channel();
        if !self.post(VoiceMessage::Start(reply)) {
            return Err(VoiceError::Aborted);
        }
        response.await.unwrap_or(Err(VoiceError::Aborted))
    }

    pub fn stop(&self) {
        self.post(VoiceMessage::Stop);
    }

    /// Clear transcript and error, leaving the phase alone.
    pub fn reset(&self) {
        self.post(VoiceMessage::Reset);
    }

    /// State after everything queued so far has been processed.
    pub async fn snapshot(&self) -> VoiceState {
        let (reply, response) = oneshot::channel();
        if !self.post(VoiceMessage::Snapshot(reply)) {
            return self.current();
        }
        response.await.unwrap_or_else(|_| self.current())
    }

    /// Last published state, without waiting on the queue.
    pub fn current(&self) -> VoiceState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<VoiceState> {
        self.state.clone()
    }
}
