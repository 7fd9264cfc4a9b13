pub mod http;

use crate::db::models::{AnswerMetadata, Document, DocumentFile, Message, Source};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use http::HttpGateway;

/// Which backend call an [`ApiError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    Upload,
    Delete,
    DocumentDetails,
    Query,
    History,
    DeleteConversation,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApiOperation::Upload => "upload",
            ApiOperation::Delete => "delete",
            ApiOperation::DocumentDetails => "document details",
            ApiOperation::Query => "query",
            ApiOperation::History => "history",
            ApiOperation::DeleteConversation => "delete conversation",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No response from server. Please check if the backend is running.")]
    NoResponse {
        operation: ApiOperation,
        reason: String,
    },
    #[error("{}", detail.as_deref().unwrap_or("An error occurred"))]
    Status {
        operation: ApiOperation,
        status: u16,
        detail: Option<String>,
    },
    #[error("An unexpected error occurred: {reason}")]
    Unexpected {
        operation: ApiOperation,
        reason: String,
    },
}

impl ApiError {
    /// HTTP status of the failed call. `None` means no response arrived at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn operation(&self) -> ApiOperation {
        match self {
            ApiError::NoResponse { operation, .. }
            | ApiError::Status { operation, .. }
            | ApiError::Unexpected { operation, .. } => *operation,
        }
    }
}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.loaded as f64 * 100.0 / self.total as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub question: String,
    pub conversation_id: Option<String>,
    pub document_filter: Vec<String>,
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default, deserialize_with = "crate::db::models::optional_string_or_number")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub metadata: Option<AnswerMetadata>,
}

impl QueryResponse {
    pub fn message_id(&self) -> Option<&str> {
        self.metadata.as_ref()?.message_id.as_deref()
    }
}

pub type ProgressFn = dyn Fn(UploadProgress) + Send + Sync;

/// Request/response boundary to the question-answering backend.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn upload_document(
        &self,
        file: &DocumentFile,
        on_progress: &ProgressFn,
    ) -> Result<Document, ApiError>;

    async fn document_details(&self, document_id: &str) -> Result<Document, ApiError>;

    async fn delete_document(&self, document_id: &str) -> Result<(), ApiError>;

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError>;

    async fn conversation_messages(&self, conversation_id: &str)
        -> Result<Vec<Message>, ApiError>;

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError>;
}
