//! Client session: the active document, its conversation, and the glue that
//! feeds voice transcripts into the question box.

pub mod context;
pub mod conversation;
pub mod documents;

pub use context::{ChatContext, ConversationSession, SessionSnapshot, UploadState};
pub use conversation::{ChatError, Conversation, InputKey};
pub use documents::{DocumentError, DocumentManager};

use crate::api::BackendGateway;
use crate::db::ClientSettings;
use crate::voice::{VoiceHandle, VoiceState};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A cancelable yes/no question put to the user before destructive actions.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Everything a front end needs, sharing one [`ChatContext`].
#[derive(Clone)]
pub struct ChatClient {
    ctx: Arc<ChatContext>,
    documents: DocumentManager,
    conversation: Conversation,
}

impl ChatClient {
    pub fn new(
        settings: &ClientSettings,
        gateway: Arc<dyn BackendGateway>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        let ctx = Arc::new(ChatContext::new());
        let documents = DocumentManager::new(
            ctx.clone(),
            gateway.clone(),
            confirm.clone(),
            settings.max_upload_bytes(),
        );
        let conversation = Conversation::new(ctx.clone(), gateway, confirm, settings.top_k)
            .purge_remote_on_clear(settings.purge_remote_on_clear);
        Self {
            ctx,
            documents,
            conversation,
        }
    }

    pub fn context(&self) -> &Arc<ChatContext> {
        &self.ctx
    }

    pub fn documents(&self) -> &DocumentManager {
        &self.documents
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Mirror voice capture output into the session until the capture owner
    /// goes away. Must be called from within a tokio runtime.
    pub fn attach_voice(&self, voice: &VoiceHandle) -> tokio::task::JoinHandle<()> {
        tokio::spawn(voice_bridge(self.conversation.clone(), voice))
    }
}

/// Copies new transcripts into the input buffer and new voice errors into
/// the chat error slot. Resolves once the voice state channel closes.
pub fn voice_bridge(
    conversation: Conversation,
    voice: &VoiceHandle,
) -> impl Future<Output = ()> + Send + 'static {
    let mut states = voice.subscribe();
    async move {
        let mut last = states.borrow_and_update().clone();
        mirror_voice_state(&conversation, &VoiceState::default(), &last);
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            mirror_voice_state(&conversation, &last, &state);
            last = state;
        }
        log::debug!("[voice_bridge] voice state closed");
    }
}

fn mirror_voice_state(conversation: &Conversation, last: &VoiceState, state: &VoiceState) {
    if state.transcript != last.transcript {
        conversation.absorb_transcript(&state.transcript);
    }
    if state.error != last.error {
        if let Some(err) = &state.error {
            conversation.surface_voice_error(err);
        }
    }
}
