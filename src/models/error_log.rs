use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};

/// The structured body of an error-log row, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetails {
    pub http_request: String,
    pub url: String,
    pub params: serde_json::Value,
    /// Source location that observed the failure, `file:line`.
    pub line: String,
    /// Operation that failed.
    pub method: String,
    pub error: String,
    /// Local time in `dd-mm-YYYY HH:MM:SS`.
    pub timestamp: String,
}

/// One persisted error-log row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ErrorLogRecord {
    pub id: i64,
    pub error: Json<ErrorDetails>,
    pub created_at: DateTime<Utc>,
}
