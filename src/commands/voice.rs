use super::AppState;
use crate::session;
use crate::voice::{
    EngineEvent, EngineEventSink, RecognitionConfig, SpeechEngine, VoiceCapture, VoiceError,
    VoiceHandle, VoiceState,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tauri::{AppHandle, Emitter, State};
use tokio::sync::oneshot;

const PERMISSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Speech engine living in the webview. Control flows out as events, results
/// come back through [`voice_engine_event`] and permission answers through
/// [`voice_permission`].
pub struct WebviewEngine {
    app: AppHandle,
    supported: bool,
    pending_permission: Mutex<Option<oneshot::Sender<bool>>>,
}

impl WebviewEngine {
    /// `supported` is what the webview reported about its recognizer.
    pub fn new(app: AppHandle, supported: bool) -> Self {
        Self {
            app,
            supported,
            pending_permission: Mutex::new(None),
        }
    }

    fn resolve_permission(&self, granted: bool) -> bool {
        let pending = self
            .pending_permission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(tx) => tx.send(granted).is_ok(),
            None => false,
        }
    }

    fn emit(&self, event: &str, payload: impl serde::Serialize + Clone) -> Result<(), VoiceError> {
        self.app.emit(event, payload).map_err(|e| {
            log::error!("[voice] emit {} failed: {}", event, e);
            VoiceError::Unknown(e.to_string())
        })
    }
}

#[async_trait]
impl SpeechEngine for WebviewEngine {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn request_microphone(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        *self
            .pending_permission
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        if self.emit("voice://permission", ()).is_err() {
            return false;
        }
        match tokio::time::timeout(PERMISSION_TIMEOUT, rx).await {
            Ok(Ok(granted)) => granted,
            _ => {
                log::warn!("[voice] no permission answer from webview");
                false
            }
        }
    }

    fn release_microphone(&self) {
        let _ = self.emit("voice://release", ());
    }

    fn start(&self, config: &RecognitionConfig) -> Result<(), VoiceError> {
        self.emit("voice://start", config.clone())
    }

    fn stop(&self) {
        let _ = self.emit("voice://stop", ());
    }
}

/// The capture owner and its endpoints, created once the webview has
/// reported its capability.
pub struct VoiceRuntime {
    pub handle: VoiceHandle,
    pub sink: EngineEventSink,
    pub engine: Arc<WebviewEngine>,
}

impl VoiceRuntime {
    fn spawn(app: &AppHandle, state: &AppState, supported: bool) -> Self {
        let engine = Arc::new(WebviewEngine::new(app.clone(), supported));
        let capture = VoiceCapture::new(
            engine.clone(),
            RecognitionConfig::with_language(state.speech_language.clone()),
        );
        let handle = capture.handle();
        let sink = capture.sink();
        tauri::async_runtime::spawn(capture.run());
        tauri::async_runtime::spawn(session::voice_bridge(
            state.client.conversation().clone(),
            &handle,
        ));

        let app = app.clone();
        let mut updates = handle.subscribe();
        tauri::async_runtime::spawn(async move {
            while updates.changed().await.is_ok() {
                let voice = updates.borrow_and_update().clone();
                if let Err(e) = app.emit("voice-updated", voice) {
                    log::warn!("[voice] emit voice-updated failed: {}", e);
                }
            }
        });

        log::info!("[voice] capture ready (recognizer supported: {})", supported);
        Self {
            handle,
            sink,
            engine,
        }
    }
}

fn runtime<'a>(state: &'a AppState) -> Result<&'a VoiceRuntime, VoiceError> {
    state.voice.get().ok_or_else(|| {
        log::warn!("[voice] used before the webview reported its capability");
        VoiceError::UnsupportedCapability
    })
}

/// Called by the webview once on load. Later calls return the current state
/// without re-probing.
#[tauri::command]
pub fn voice_capability(app: AppHandle, state: State<'_, AppState>, supported: bool) -> VoiceState {
    state
        .voice
        .get_or_init(|| VoiceRuntime::spawn(&app, &state, supported))
        .handle
        .current()
}

#[tauri::command]
pub async fn voice_start(state: State<'_, AppState>) -> Result<VoiceState, VoiceError> {
    let voice = runtime(&state)?;
    voice.handle.start().await?;
    Ok(voice.handle.snapshot().await)
}

#[tauri::command]
pub fn voice_stop(state: State<'_, AppState>) {
    if let Ok(voice) = runtime(&state) {
        voice.handle.stop();
    }
}

#[tauri::command]
pub fn voice_reset(state: State<'_, AppState>) {
    if let Ok(voice) = runtime(&state) {
        voice.handle.reset();
    }
}

#[tauri::command]
pub fn voice_engine_event(state: State<'_, AppState>, event: EngineEvent) -> bool {
    runtime(&state).map(|voice| voice.sink.post(event)).unwrap_or(false)
}

#[tauri::command]
pub fn voice_permission(state: State<'_, AppState>, granted: bool) -> bool {
    runtime(&state)
        .map(|voice| voice.engine.resolve_permission(granted))
        .unwrap_or(false)
}
