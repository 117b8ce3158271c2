use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::ValidationError;

use crate::validation::rule_error;

/// A file stored for a task. `path` is the public URL or storage path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Attachment {
    pub id: i64,
    pub task_id: i64,
    pub filename: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// A file already written to the object store, waiting for its task row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub path: String,
}

/// Longest filename kept in the `attachments` table.
pub const MAX_FILENAME_CHARS: usize = 255;

/// A file sent inline with a task request; `content` is standard base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentUpload {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub content: String,
}

impl AttachmentUpload {
    /// Decodes the base64 body.
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(self.content.trim())
    }
}

pub fn validate_attachment(upload: &AttachmentUpload) -> Result<(), ValidationError> {
    if upload.filename.trim().is_empty() {
        return Err(rule_error("required", "Attachment filename is required"));
    }
    if upload.filename.chars().count() > MAX_FILENAME_CHARS {
        return Err(rule_error(
            "length",
            "Attachment filename must be at most 255 characters",
        ));
    }
    match upload.bytes() {
        Ok(bytes) if !bytes.is_empty() => Ok(()),
        _ => Err(rule_error("file", "Attachment must be a base64 encoded file")),
    }
}
