use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Message identity. Ids minted on this client never share a namespace with
/// ids handed out by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    Local(Uuid),
    Remote(String),
}

impl MessageId {
    pub fn local() -> Self {
        MessageId::Local(Uuid::new_v4())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MessageId::Local(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Local(id) => write!(f, "temp-{}", id),
            MessageId::Remote(id) => f.write_str(id),
        }
    }
}

impl Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        string_or_number(deserializer).map(MessageId::Remote)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

/// Backend ids arrive as either JSON strings or integers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

pub(crate) fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub page_number: u32,
    #[serde(alias = "content")]
    pub text: String,
    #[serde(default, deserialize_with = "clamped_score")]
    pub relevance_score: Option<f64>,
}

fn clamped_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.map(|s| s.clamp(0.0, 1.0)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(alias = "created_at", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Message {
    /// Optimistic entry for a question typed or spoken on this client.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::local(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            sources: Vec::new(),
        }
    }

    pub fn assistant(id: MessageId, content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            sources,
        }
    }

    /// Assistant-side entry recording a failed query.
    pub fn failure(reason: &str) -> Self {
        Self::assistant(MessageId::local(), format!("Error: {}", reason), Vec::new())
    }

    pub fn display_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%I:%M %p")
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Whether the backend has finished with the document, one way or the other.
    pub fn is_settled(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub original_filename: String,
    pub file_size: u64,
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub chunk_count: u32,
}

impl Document {
    /// One-line description, e.g. `2 MB • Status: pending • 12 chunks`.
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} • Status: {}",
            format_file_size(self.file_size),
            self.processing_status
        );
        if self.chunk_count > 0 {
            line.push_str(&format!(" • {} chunks", self.chunk_count));
        }
        line
    }
}

/// A file picked for upload, read fully into memory.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving its content type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let content_type = match ext.as_str() {
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        };
        let bytes = fs::read(path)?;
        Ok(Self::new(filename, content_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Metadata the backend may attach to a query answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnswerMetadata {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub message_id: Option<String>,
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
