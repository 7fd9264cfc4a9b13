use super::context::ChatContext;
use super::Confirm;
use crate::api::{ApiError, BackendGateway, UploadProgress};
use crate::db::models::{Document, DocumentFile};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const ACCEPTED_CONTENT_TYPE: &str = "application/pdf";
const REMOVE_PROMPT: &str =
    "Are you sure you want to remove this document? All associated data will be deleted.";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Please select a PDF file")]
    InvalidFileType { content_type: String },
    #[error("File size must be less than {max_mb}MB")]
    FileTooLarge { size: u64, max_mb: u64 },
    #[error("Please select a file first")]
    NoFileSelected,
    #[error("No document is active")]
    NoActiveDocument,
    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Gateway(#[from] ApiError),
}

impl Serialize for DocumentError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Upload, removal and status tracking of the active document.
#[derive(Clone)]
pub struct DocumentManager {
    ctx: Arc<ChatContext>,
    gateway: Arc<dyn BackendGateway>,
    confirm: Arc<dyn Confirm>,
    max_upload_bytes: u64,
}

impl DocumentManager {
    pub fn new(
        ctx: Arc<ChatContext>,
        gateway: Arc<dyn BackendGateway>,
        confirm: Arc<dyn Confirm>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            ctx,
            gateway,
            confirm,
            max_upload_bytes,
        }
    }

    /// Local checks run before anything touches the network.
    pub fn validate(&self, file: &DocumentFile) -> Result<(), DocumentError> {
        let essence = file
            .content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim();
        if !essence.eq_ignore_ascii_case(ACCEPTED_CONTENT_TYPE) {
            return Err(DocumentError::InvalidFileType {
                content_type: file.content_type.clone(),
            });
        }
        if file.size() > self.max_upload_bytes {
            return Err(DocumentError::FileTooLarge {
                size: file.size(),
                max_mb: self.max_upload_bytes / (1024 * 1024),
            });
        }
        Ok(())
    }

    /// Validate and upload `file`. On success it becomes the active document
    /// and the conversation starts over. On failure the active document is
    /// left alone and the error lands in the document error slot.
    pub async fn upload(&self, file: Option<&DocumentFile>) -> Result<Document, DocumentError> {
        let result = match file {
            Some(file) => self.upload_file(file).await,
            None => Err(DocumentError::NoFileSelected),
        };
        if let Err(err) = &result {
            let message = err.to_string();
            self.ctx.update(|state| {
                state.upload = Default::default();
                state.document_error = Some(message);
            });
        }
        result
    }

    async fn upload_file(&self, file: &DocumentFile) -> Result<Document, DocumentError> {
        if let Err(err) = self.validate(file) {
            log::warn!("[upload] rejected {}: {}", file.filename, err);
            return Err(err);
        }

        self.ctx.update(|state| {
            state.upload.in_progress = true;
            state.upload.percent = None;
            state.document_error = None;
        });
        log::info!("[upload] sending {} ({} bytes)", file.filename, file.size());

        let ctx = self.ctx.clone();
        let on_progress = move |progress: UploadProgress| {
            let percent = progress.percent();
            ctx.update(|state| state.upload.percent = Some(percent));
        };
        let document = self
            .gateway
            .upload_document(file, &on_progress)
            .await
            .map_err(|err| {
                log::error!("[upload] {} failed: {}", file.filename, err);
                DocumentError::Gateway(err)
            })?;

        self.ctx.update(|state| {
            state.upload = Default::default();
            state.switch_document(Some(document.clone()));
        });
        Ok(document)
    }

    /// Read `path` from disk and upload it.
    pub async fn upload_path(&self, path: &Path) -> Result<Document, DocumentError> {
        match DocumentFile::from_path(path) {
            Ok(file) => self.upload(Some(&file)).await,
            Err(err) => {
                log::error!("[upload] cannot read {}: {}", path.display(), err);
                let err = DocumentError::Io(err);
                let message = err.to_string();
                self.ctx.update(|state| state.document_error = Some(message));
                Err(err)
            }
        }
    }

    /// Delete the active document after the user confirms. Returns false if
    /// the user backed out.
    pub async fn remove(&self) -> Result<bool, DocumentError> {
        let Some(document) = self.ctx.active_document() else {
            return Err(DocumentError::NoActiveDocument);
        };
        if !self.confirm.confirm(REMOVE_PROMPT).await {
            return Ok(false);
        }

        if let Err(err) = self.gateway.delete_document(&document.id).await {
            log::error!("[remove] deleting {} failed: {}", document.id, err);
            let message = err.to_string();
            self.ctx.update(|state| state.document_error = Some(message));
            return Err(err.into());
        }

        self.ctx.update(|state| {
            state.document_error = None;
            if state.active_document_id() == Some(document.id.as_str()) {
                state.switch_document(None);
            } else {
                log::info!("[remove] {} was replaced meanwhile, keeping active document", document.id);
            }
        });
        Ok(true)
    }

    /// Fetch fresh metadata for the active document. The conversation is
    /// kept since the document identity has not changed.
    pub async fn refresh_status(&self) -> Result<Document, DocumentError> {
        let Some(current) = self.ctx.active_document() else {
            return Err(DocumentError::NoActiveDocument);
        };
        let fresh = self
            .gateway
            .document_details(&current.id)
            .await
            .map_err(|err| {
                log::warn!("[refresh_status] {} failed: {}", current.id, err);
                DocumentError::Gateway(err)
            })?;

        self.ctx.update(|state| match state.document.as_mut() {
            Some(active) if active.id == fresh.id => *active = fresh.clone(),
            _ => log::debug!("[refresh_status] {} no longer active", fresh.id),
        });
        Ok(fresh)
    }

    /// Poll until the backend has finished with the active document or
    /// `max_polls` refreshes have been made.
    pub async fn await_processing(
        &self,
        interval: Duration,
        max_polls: usize,
    ) -> Result<Document, DocumentError> {
        let mut latest = self
            .ctx
            .active_document()
            .ok_or(DocumentError::NoActiveDocument)?;
        for poll in 0..max_polls {
            if latest.processing_status.is_settled() {
                break;
            }
            if poll > 0 {
                tokio::time::sleep(interval).await;
            }
            latest = self.refresh_status().await?;
            log::debug!(
                "[await_processing] {} is {} (poll {})",
                latest.id,
                latest.processing_status,
                poll + 1
            );
        }
        Ok(latest)
    }
}
