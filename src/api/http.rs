use super::{
    ApiError, ApiOperation, BackendGateway, ProgressFn, QueryRequest, QueryResponse,
    UploadProgress,
};
use crate::db::models::{Document, DocumentFile, Message};
use crate::db::ClientSettings;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Deserialize)]
struct UploadResponse {
    document: Document,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessagesPayload {
    Paged { results: Vec<Message> },
    Bare(Vec<Message>),
}

/// REST client for the question-answering backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, reqwest::Error> {
        Self::new(
            settings.api_base_url.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Pull a human-readable message out of an error body such as
/// `{"detail": "Not found."}`.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail").or_else(|| value.get("error"))?;
    match detail {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn transport_error(operation: ApiOperation, err: reqwest::Error) -> ApiError {
    if err.is_builder() {
        ApiError::Unexpected {
            operation,
            reason: err.to_string(),
        }
    } else {
        ApiError::NoResponse {
            operation,
            reason: err.to_string(),
        }
    }
}

async fn check_status(operation: ApiOperation, resp: Response) -> Result<Response, ApiError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    log::warn!("[gateway] {} failed with status {}: {}", operation, status, text);
    Err(ApiError::Status {
        operation,
        status,
        detail: extract_detail(&text),
    })
}

async fn send(operation: ApiOperation, req: RequestBuilder) -> Result<Response, ApiError> {
    let resp = req.send().await.map_err(|e| {
        log::error!("[gateway] {} request failed: {}", operation, e);
        transport_error(operation, e)
    })?;
    check_status(operation, resp).await
}

async fn decode<T: DeserializeOwned>(operation: ApiOperation, resp: Response) -> Result<T, ApiError> {
    resp.json::<T>().await.map_err(|e| ApiError::Unexpected {
        operation,
        reason: e.to_string(),
    })
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn upload_document(
        &self,
        file: &DocumentFile,
        on_progress: &ProgressFn,
    ) -> Result<Document, ApiError> {
        let op = ApiOperation::Upload;
        let total = file.size();
        let chunks: Vec<Vec<u8>> = file
            .bytes
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(<[u8]>::to_vec)
            .collect();

        // The body stream has to be 'static, so progress travels back over a
        // channel and the callback runs on this task.
        let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<u64>();
        let mut loaded = 0u64;
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            loaded += chunk.len() as u64;
            let _ = progress_tx.send(loaded);
            Ok::<_, std::io::Error>(chunk)
        }));

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)
            .map_err(|e| transport_error(op, e))?;
        let form = Form::new().part("file", part);

        let request = self
            .client
            .post(self.url("documents/upload/"))
            .multipart(form)
            .send();
        tokio::pin!(request);

        let result = loop {
            tokio::select! {
                res = &mut request => break res,
                Some(loaded) = progress_rx.recv() => on_progress(UploadProgress { loaded, total }),
            }
        };
        while let Ok(loaded) = progress_rx.try_recv() {
            on_progress(UploadProgress { loaded, total });
        }

        let resp = result.map_err(|e| {
            log::error!("[gateway] upload of {} failed: {}", file.filename, e);
            transport_error(op, e)
        })?;
        let resp = check_status(op, resp).await?;
        let body: UploadResponse = decode(op, resp).await?;
        Ok(body.document)
    }

    async fn document_details(&self, document_id: &str) -> Result<Document, ApiError> {
        let op = ApiOperation::DocumentDetails;
        let resp = send(
            op,
            self.client.get(self.url(&format!("documents/{}/", document_id))),
        )
        .await?;
        decode(op, resp).await
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), ApiError> {
        send(
            ApiOperation::Delete,
            self.client
                .delete(self.url(&format!("documents/{}/", document_id))),
        )
        .await?;
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError> {
        let op = ApiOperation::Query;
        let resp = send(
            op,
            self.client.post(self.url("chat/query/")).json(request),
        )
        .await?;
        decode(op, resp).await
    }

    async fn conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, ApiError> {
        let op = ApiOperation::History;
        let resp = send(
            op,
            self.client.get(self.url(&format!(
                "chat/conversations/{}/messages/",
                conversation_id
            ))),
        )
        .await?;
        Ok(match decode::<MessagesPayload>(op, resp).await? {
            MessagesPayload::Paged { results } => results,
            MessagesPayload::Bare(messages) => messages,
        })
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError> {
        send(
            ApiOperation::DeleteConversation,
            self.client
                .delete(self.url(&format!("chat/conversations/{}/", conversation_id))),
        )
        .await?;
        Ok(())
    }
}
