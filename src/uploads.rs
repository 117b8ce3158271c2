//! Attachment storage.
//!
//! Task attachments arrive base64 encoded in the request body. They are written to
//! an object store before any row is inserted, and only the resulting URL or path
//! is kept in the `attachments` table.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::config::CloudinaryConfig;
use crate::error::AppError;
use crate::models::{AttachmentUpload, StoredFile};

lazy_static! {
    // Anything outside this set is replaced before a name reaches a path or URL.
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

/// Longest sanitized name used in a path or public id.
const MAX_STORED_NAME: usize = 100;
/// Extensions longer than this are cut along with the rest of the name.
const MAX_KEPT_EXTENSION: usize = 16;

#[derive(Debug)]
pub enum UploadError {
    /// The attachment body is not valid base64 or is empty.
    InvalidContent,
    Io(String),
    Transport(String),
    /// The object store answered with a non-success status.
    Rejected { status: u16, body: String },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UploadError::InvalidContent => write!(f, "attachment content is not valid base64"),
            UploadError::Io(e) => write!(f, "failed to write attachment: {}", e),
            UploadError::Transport(e) => write!(f, "failed to reach file store: {}", e),
            UploadError::Rejected { status, body } => {
                write!(f, "file store rejected upload ({}): {}", status, body)
            }
        }
    }
}

impl std::error::Error for UploadError {}

impl From<std::io::Error> for UploadError {
    fn from(error: std::io::Error) -> Self {
        UploadError::Io(error.to_string())
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(error: reqwest::Error) -> Self {
        UploadError::Transport(error.to_string())
    }
}

impl From<UploadError> for AppError {
    fn from(error: UploadError) -> AppError {
        match error {
            UploadError::InvalidContent => {
                AppError::invalid("Attachment must be a base64 encoded file")
            }
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

/// Replaces characters that are unsafe in paths and URLs and shortens long names,
/// keeping a short extension. Never returns an empty name.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        return "file".to_string();
    }
    if cleaned.len() <= MAX_STORED_NAME {
        return cleaned.to_string();
    }
    // Only ASCII survives the replacement, so byte offsets are char boundaries.
    match cleaned.rfind('.') {
        Some(dot) if cleaned.len() - dot <= MAX_KEPT_EXTENSION => {
            let extension = &cleaned[dot..];
            format!("{}{}", &cleaned[..MAX_STORED_NAME - extension.len()], extension)
        }
        _ => cleaned[..MAX_STORED_NAME].to_string(),
    }
}

/// A place attachments can be written to.
#[async_trait]
pub trait FileUploader: Send + Sync {
    /// Stores `bytes` and returns the URL or path they can be fetched from.
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, UploadError>;
}

/// Decodes and stores an attachment, returning the row values for it.
pub async fn store_attachment(
    uploader: &dyn FileUploader,
    upload: &AttachmentUpload,
) -> Result<StoredFile, UploadError> {
    let bytes = upload.bytes().map_err(|_| UploadError::InvalidContent)?;
    if bytes.is_empty() {
        return Err(UploadError::InvalidContent);
    }
    let path = uploader.upload(&sanitize_filename(&upload.filename), bytes).await?;
    log::info!("Stored attachment {} at {}", upload.filename, path);
    Ok(StoredFile {
        filename: upload.filename.clone(),
        path,
    })
}

/// Writes attachments under a local directory.
pub struct LocalUploader {
    dir: PathBuf,
}

impl LocalUploader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FileUploader for LocalUploader {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}-{}", Uuid::new_v4(), filename));
        tokio::fs::write(&path, bytes).await?;
        Ok(path.to_string_lossy().into_owned())
    }
}

#[derive(Deserialize)]
struct CloudinaryResponse {
    secure_url: String,
}

/// Unsigned uploads to Cloudinary through an upload preset.
pub struct CloudinaryUploader {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1_1/{}/auto/upload",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name
        )
    }
}

#[async_trait]
impl FileUploader for CloudinaryUploader {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, UploadError> {
        let file = format!(
            "data:application/octet-stream;base64,{}",
            general_purpose::STANDARD.encode(bytes)
        );
        let public_id = format!("{}-{}", Uuid::new_v4(), filename);
        let mut form = vec![
            ("file", file),
            ("upload_preset", self.config.upload_preset.clone()),
            ("public_id", public_id),
        ];
        if let Some(folder) = &self.config.folder {
            form.push(("folder", folder.clone()));
        }

        let response = self.client.post(self.endpoint()).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let uploaded: CloudinaryResponse = response.json().await?;
        Ok(uploaded.secure_url)
    }
}
