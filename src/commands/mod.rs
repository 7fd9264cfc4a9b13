pub mod chat;
pub mod documents;
pub mod settings;
pub mod voice;

use crate::session::{ChatClient, Confirm};
use async_trait::async_trait;
use std::sync::OnceLock;
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};
use tokio::sync::oneshot;

/// Managed state shared by every command.
pub struct AppState {
    pub client: ChatClient,
    pub speech_language: String,
    pub voice: OnceLock<voice::VoiceRuntime>,
}

/// Native OK/Cancel dialog.
pub struct DialogConfirm {
    app: AppHandle,
}

impl DialogConfirm {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

#[async_trait]
impl Confirm for DialogConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        self.app
            .dialog()
            .message(prompt)
            .title("Confirm")
            .kind(MessageDialogKind::Warning)
            .buttons(MessageDialogButtons::OkCancel)
            .show(move |answer| {
                let _ = tx.send(answer);
            });
        rx.await.unwrap_or(false)
    }
}
