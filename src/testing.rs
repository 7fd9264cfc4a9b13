//! In-memory stand-ins for the backend, the confirmation prompt and the
//! speech engine.

use crate::api::{
    ApiError, ApiOperation, BackendGateway, ProgressFn, QueryRequest, QueryResponse,
    UploadProgress,
};
use crate::db::models::{Document, DocumentFile, Message, ProcessingStatus, Source};
use crate::session::Confirm;
use crate::voice::{RecognitionConfig, SpeechEngine, VoiceError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

pub fn sample_document(id: &str) -> Document {
    Document {
        id: id.to_string(),
        original_filename: format!("{}.pdf", id),
        file_size: 2 * 1024 * 1024,
        processing_status: ProcessingStatus::Pending,
        chunk_count: 0,
    }
}

pub fn pdf_file(size: usize) -> DocumentFile {
    DocumentFile::new("report.pdf", "application/pdf", vec![0u8; size])
}

pub fn answer(text: &str, conversation_id: &str, source_count: usize) -> QueryResponse {
    QueryResponse {
        answer: text.to_string(),
        conversation_id: Some(conversation_id.to_string()),
        sources: (0..source_count)
            .map(|i| Source {
                page_number: i as u32 + 1,
                text: format!("excerpt {}", i),
                relevance_score: Some(0.9),
            })
            .collect(),
        metadata: None,
    }
}

pub fn server_error(operation: ApiOperation, status: u16, detail: &str) -> ApiError {
    ApiError::Status {
        operation,
        status,
        detail: Some(detail.to_string()),
    }
}

pub fn no_response(operation: ApiOperation) -> ApiError {
    ApiError::NoResponse {
        operation,
        reason: "connection refused".to_string(),
    }
}

type QueryResult = Result<QueryResponse, ApiError>;
type HistoryResult = Result<Vec<Message>, ApiError>;

enum QueryReply {
    Ready(QueryResult),
    Gated(oneshot::Receiver<QueryResult>),
}

/// Scripted backend. Unscripted queries answer "Answer" in conversation
/// `conv-default`.
#[derive(Default)]
pub struct FakeGateway {
    pub queries: Mutex<Vec<QueryRequest>>,
    query_replies: Mutex<VecDeque<QueryReply>>,
    pub upload_calls: AtomicUsize,
    upload_result: Mutex<Option<Result<Document, ApiError>>>,
    upload_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub deleted_documents: Mutex<Vec<String>>,
    delete_error: Mutex<Option<ApiError>>,
    details: Mutex<VecDeque<Document>>,
    history: Mutex<Option<Result<Vec<Message>, ApiError>>>,
    history_gate: Mutex<Option<oneshot::Receiver<HistoryResult>>>,
    pub history_calls: AtomicUsize,
    pub deleted_conversations: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn reply(&self, response: QueryResponse) {
        self.push_reply(QueryReply::Ready(Ok(response)));
    }

    pub fn fail(&self, err: ApiError) {
        self.push_reply(QueryReply::Ready(Err(err)));
    }

    /// Queue a reply that only settles when the returned sender fires.
    pub fn gate(&self) -> oneshot::Sender<QueryResult> {
        let (tx, rx) = oneshot::channel();
        self.push_reply(QueryReply::Gated(rx));
        tx
    }

    fn push_reply(&self, reply: QueryReply) {
        self.query_replies.lock().unwrap().push_back(reply);
    }

    pub fn upload_returns(&self, result: Result<Document, ApiError>) {
        *self.upload_result.lock().unwrap() = Some(result);
    }

    /// Hold the next upload at half progress until the returned sender fires.
    pub fn gate_upload(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.upload_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// The next history load settles only when the returned sender fires.
    pub fn gate_history(&self) -> oneshot::Sender<HistoryResult> {
        let (tx, rx) = oneshot::channel();
        *self.history_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn delete_fails(&self, err: ApiError) {
        *self.delete_error.lock().unwrap() = Some(err);
    }

    pub fn details_sequence(&self, docs: Vec<Document>) {
        *self.details.lock().unwrap() = docs.into();
    }

    pub fn history_returns(&self, result: Result<Vec<Message>, ApiError>) {
        *self.history.lock().unwrap() = Some(result);
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl BackendGateway for FakeGateway {
    async fn upload_document(
        &self,
        file: &DocumentFile,
        on_progress: &ProgressFn,
    ) -> Result<Document, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let total = file.size();
        on_progress(UploadProgress {
            loaded: total / 2,
            total,
        });
        let gate = self.upload_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        on_progress(UploadProgress {
            loaded: total,
            total,
        });
        self.upload_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(sample_document("uploaded")))
    }

    async fn document_details(&self, document_id: &str) -> Result<Document, ApiError> {
        let next = self.details.lock().unwrap().pop_front();
        next.ok_or_else(|| server_error(ApiOperation::DocumentDetails, 404, document_id))
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), ApiError> {
        if let Some(err) = self.delete_error.lock().unwrap().take() {
            return Err(err);
        }
        self.deleted_documents
            .lock()
            .unwrap()
            .push(document_id.to_string());
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError> {
        self.queries.lock().unwrap().push(request.clone());
        let reply = self.query_replies.lock().unwrap().pop_front();
        match reply {
            Some(QueryReply::Ready(result)) => result,
            Some(QueryReply::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(no_response(ApiOperation::Query))),
            None => Ok(answer("Answer", "conv-default", 1)),
        }
    }

    async fn conversation_messages(
        &self,
        _conversation_id: &str,
    ) -> Result<Vec<Message>, ApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.history_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            return gate
                .await
                .unwrap_or_else(|_| Err(no_response(ApiOperation::History)));
        }
        self.history
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError> {
        self.deleted_conversations
            .lock()
            .unwrap()
            .push(conversation_id.to_string());
        Ok(())
    }
}

/// Confirmation prompt with a fixed answer that records what was asked.
pub struct FakeConfirm {
    answer: AtomicBool,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeConfirm {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer: AtomicBool::new(answer),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_answer(&self, answer: bool) {
        self.answer.store(answer, Ordering::SeqCst);
    }
}

#[async_trait]
impl Confirm for FakeConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer.load(Ordering::SeqCst)
    }
}

/// Speech engine double counting every call made by the capture owner.
pub struct FakeEngine {
    supported: bool,
    grant: AtomicBool,
    start_error: Mutex<Option<VoiceError>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub releases: AtomicUsize,
    pub last_config: Mutex<Option<RecognitionConfig>>,
}

impl FakeEngine {
    pub fn new(supported: bool, grant: bool) -> Self {
        Self {
            supported,
            grant: AtomicBool::new(grant),
            start_error: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            last_config: Mutex::new(None),
        }
    }

    pub fn set_grant(&self, grant: bool) {
        self.grant.store(grant, Ordering::SeqCst);
    }

    pub fn fail_next_start(&self, err: VoiceError) {
        *self.start_error.lock().unwrap() = Some(err);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechEngine for FakeEngine {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn request_microphone(&self) -> bool {
        self.grant.load(Ordering::SeqCst)
    }

    fn release_microphone(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn start(&self, config: &RecognitionConfig) -> Result<(), VoiceError> {
        *self.last_config.lock().unwrap() = Some(config.clone());
        if let Some(err) = self.start_error.lock().unwrap().take() {
            return Err(err);
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
