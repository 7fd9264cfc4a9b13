use crate::db::models::{Document, Message};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Message history plus the backend-assigned conversation id.
#[derive(Debug, Default, Clone)]
pub struct ConversationSession {
    pub conversation_id: Option<String>,
    pub messages: Vec<Message>,
    /// Queries sent but not yet settled. Pending while non-zero.
    pub in_flight: usize,
    pub last_error: Option<String>,
    /// Bumped on every reset; responses from an older epoch are discarded.
    pub epoch: u64,
}

impl ConversationSession {
    pub(crate) fn reset(&mut self) {
        self.conversation_id = None;
        self.messages.clear();
        self.last_error = None;
        self.epoch += 1;
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight > 0
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadState {
    pub in_progress: bool,
    pub percent: Option<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct ContextState {
    pub document: Option<Document>,
    pub session: ConversationSession,
    pub input: String,
    pub upload: UploadState,
    pub document_error: Option<String>,
}

impl ContextState {
    /// The only way to change the active document. The conversation is reset
    /// in the same step so answers never outlive the document they were
    /// given for.
    pub fn switch_document(&mut self, document: Option<Document>) {
        match &document {
            Some(doc) => log::info!(
                "[context] active document -> {} ({})",
                doc.original_filename,
                doc.id
            ),
            None => log::info!("[context] active document cleared"),
        }
        self.document = document;
        self.session.reset();
    }

    pub fn active_document_id(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.id.as_str())
    }

    fn snapshot(&self) -> SessionSnapshot {
        let pending = self.session.is_pending();
        SessionSnapshot {
            document: self.document.clone(),
            conversation_id: self.session.conversation_id.clone(),
            messages: self.session.messages.clone(),
            pending,
            chat_error: self.session.last_error.clone(),
            document_error: self.document_error.clone(),
            upload: self.upload,
            input: self.input.clone(),
            can_send: !pending && self.document.is_some() && !self.input.trim().is_empty(),
        }
    }
}

/// Adopt the conversation id from a response unless one is already known.
/// Returns true when `current` was set.
pub fn adopt_conversation_id(current: &mut Option<String>, returned: Option<&str>) -> bool {
    match (current.as_ref(), returned) {
        (None, Some(id)) => {
            *current = Some(id.to_string());
            true
        }
        _ => false,
    }
}

/// Everything the UI renders, published after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub document: Option<Document>,
    pub conversation_id: Option<String>,
    pub messages: Vec<Message>,
    pub pending: bool,
    pub chat_error: Option<String>,
    pub document_error: Option<String>,
    pub upload: UploadState,
    pub input: String,
    pub can_send: bool,
}

/// Shared home of the active document and its conversation.
pub struct ChatContext {
    state: Mutex<ContextState>,
    publisher: watch::Sender<SessionSnapshot>,
}

impl Default for ChatContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatContext {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(SessionSnapshot::default());
        Self {
            state: Mutex::new(ContextState::default()),
            publisher,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate and publish a fresh snapshot, both under the lock.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ContextState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        // Published under the lock so concurrent updaters cannot reorder snapshots.
        self.publisher.send_replace(state.snapshot());
        result
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&ContextState) -> R) -> R {
        f(&*self.lock())
    }

    pub fn switch_document(&self, document: Option<Document>) {
        self.update(|state| state.switch_document(document));
    }

    pub fn active_document(&self) -> Option<Document> {
        self.read(|state| state.document.clone())
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.read(|state| state.session.conversation_id.clone())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.read(|state| state.session.messages.clone())
    }

    pub fn is_pending(&self) -> bool {
        self.read(|state| state.session.is_pending())
    }

    pub fn input(&self) -> String {
        self.read(|state| state.input.clone())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read(ContextState::snapshot)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.publisher.subscribe()
    }
}
