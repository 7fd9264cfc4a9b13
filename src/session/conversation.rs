use super::context::{adopt_conversation_id, ChatContext};
use super::Confirm;
use crate::api::{ApiError, BackendGateway, QueryRequest};
use crate::db::models::{Message, MessageId};
use crate::voice::VoiceError;
use serde::Serialize;
use std::sync::Arc;

const CLEAR_PROMPT: &str = "Are you sure you want to clear the chat history?";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Please enter a question")]
    EmptyQuestion,
    #[error("Please upload a document first to ask questions")]
    NoActiveDocument,
    #[error(transparent)]
    Query(#[from] ApiError),
}

impl Serialize for ChatError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Keys the question box reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKey {
    Enter,
    ShiftEnter,
}

/// Owns the message timeline and drives queries against the backend.
#[derive(Clone)]
pub struct Conversation {
    ctx: Arc<ChatContext>,
    gateway: Arc<dyn BackendGateway>,
    confirm: Arc<dyn Confirm>,
    top_k: usize,
    purge_remote_on_clear: bool,
}

impl Conversation {
    pub fn new(
        ctx: Arc<ChatContext>,
        gateway: Arc<dyn BackendGateway>,
        confirm: Arc<dyn Confirm>,
        top_k: usize,
    ) -> Self {
        Self {
            ctx,
            gateway,
            confirm,
            top_k,
            purge_remote_on_clear: false,
        }
    }

    pub fn purge_remote_on_clear(mut self, enabled: bool) -> Self {
        self.purge_remote_on_clear = enabled;
        self
    }

    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.ctx.update(|state| state.input = text);
    }

    /// Enter submits the input buffer, Shift+Enter adds a line break.
    pub async fn handle_key(&self, key: InputKey) -> Result<(), ChatError> {
        match key {
            InputKey::Enter => self.submit().await,
            InputKey::ShiftEnter => {
                self.ctx.update(|state| state.input.push('\n'));
                Ok(())
            }
        }
    }

    /// Send whatever is in the input buffer.
    pub async fn submit(&self) -> Result<(), ChatError> {
        let text = self.ctx.input();
        self.send_question(&text).await
    }

    /// Ask a question about the active document.
    ///
    /// The user message is appended before the request goes out. The outcome
    /// is appended afterwards: the answer on success, an `Error: ...` entry on
    /// failure. Neither entry is ever edited later.
    pub async fn send_question(&self, text: &str) -> Result<(), ChatError> {
        let question = text.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let prepared = self.ctx.update(|state| {
            let Some(document_id) = state.active_document_id().map(str::to_string) else {
                state.session.last_error = Some(ChatError::NoActiveDocument.to_string());
                return None;
            };
            state.session.messages.push(Message::user(question));
            state.input.clear();
            state.session.in_flight += 1;
            state.session.last_error = None;
            let request = QueryRequest {
                question: question.to_string(),
                conversation_id: state.session.conversation_id.clone(),
                document_filter: vec![document_id],
                top_k: self.top_k,
            };
            Some((state.session.epoch, request))
        });
        let Some((epoch, request)) = prepared else {
            log::warn!("[send_question] rejected, no active document");
            return Err(ChatError::NoActiveDocument);
        };

        log::info!(
            "[send_question] querying document {:?} (conversation {:?})",
            request.document_filter,
            request.conversation_id
        );
        let result = self.gateway.query(&request).await;

        self.ctx.update(|state| {
            state.session.in_flight = state.session.in_flight.saturating_sub(1);
            if state.session.epoch != epoch {
                log::warn!("[send_question] session was reset while waiting, dropping response");
                return;
            }
            match &result {
                Ok(response) => {
                    if adopt_conversation_id(
                        &mut state.session.conversation_id,
                        response.conversation_id.as_deref(),
                    ) {
                        log::info!(
                            "[send_question] adopted conversation {:?}",
                            state.session.conversation_id
                        );
                    }
                    let id = response
                        .message_id()
                        .map(|id| MessageId::Remote(id.to_string()))
                        .unwrap_or_else(MessageId::local);
                    state.session.messages.push(Message::assistant(
                        id,
                        response.answer.clone(),
                        response.sources.clone(),
                    ));
                }
                Err(err) => {
                    log::error!("[send_question] query failed: {}", err);
                    let reason = err.to_string();
                    state.session.messages.push(Message::failure(&reason));
                    state.session.last_error = Some(reason);
                }
            }
        });

        result.map(|_| ()).map_err(ChatError::Query)
    }

    /// Replace the timeline with the stored history of `conversation_id`.
    /// A failed load is logged and leaves the timeline as it was.
    pub async fn load_history(&self, conversation_id: &str) {
        let epoch = self.ctx.read(|state| state.session.epoch);
        let messages = match self.gateway.conversation_messages(conversation_id).await {
            Ok(messages) => messages,
            Err(err) => {
                log::error!("[load_history] error loading messages: {}", err);
                return;
            }
        };

        self.ctx.update(|state| {
            if state.session.epoch != epoch {
                log::warn!("[load_history] session was reset while loading, dropping history");
                return;
            }
            match state.session.conversation_id.as_deref() {
                Some(known) if known != conversation_id => {
                    log::warn!(
                        "[load_history] history for {} ignored, session belongs to {}",
                        conversation_id,
                        known
                    );
                    return;
                }
                Some(_) => {}
                None => state.session.conversation_id = Some(conversation_id.to_string()),
            }
            log::info!(
                "[load_history] restored {} messages for {}",
                messages.len(),
                conversation_id
            );
            state.session.messages = messages;
        });
    }

    /// Ask for confirmation, then forget the conversation. Returns false if
    /// the user backed out.
    pub async fn clear(&self) -> bool {
        if !self.confirm.confirm(CLEAR_PROMPT).await {
            return false;
        }
        let previous = self.ctx.update(|state| {
            let previous = state.session.conversation_id.take();
            state.session.reset();
            log::info!("[clear] conversation {:?} cleared", previous);
            previous
        });

        if self.purge_remote_on_clear {
            if let Some(id) = previous {
                if let Err(err) = self.gateway.delete_conversation(&id).await {
                    log::warn!("[clear] could not delete conversation {}: {}", id, err);
                }
            }
        }
        true
    }

    /// Mirror a recognized transcript into the input buffer.
    pub fn absorb_transcript(&self, transcript: &str) {
        if transcript.is_empty() {
            return;
        }
        self.set_input(transcript);
    }

    pub fn surface_voice_error(&self, err: &VoiceError) {
        let message = err.to_string();
        self.ctx
            .update(|state| state.session.last_error = Some(message));
    }
}
