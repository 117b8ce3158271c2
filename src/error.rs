//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every failure a handler can produce ends up here, and `AppError` implements
//! `actix_web::error::ResponseError` so that returning `Err(..)` from a handler writes the
//! uniform error envelope:
//!
//! ```json
//! { "status": false, "message": "Task not found", "code": 404 }
//! ```
//!
//! `message` is either a single string or an ordered list of validation messages.
//! System-class errors (`InternalServerError`, `DatabaseError`) never leak their detail to
//! the client: the detail is logged and the client sees a generic message.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use serde_json::json;
use std::fmt;

use crate::store::StoreError;

/// Message shown to clients for every system-class error.
pub const SYSTEM_ERROR_MESSAGE: &str = "System error occurred";

/// The `message` field of an error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    /// A single human-readable message.
    Single(String),
    /// Every failing rule, in field declaration order.
    List(Vec<String>),
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorMessage::Single(msg) => f.write_str(msg),
            ErrorMessage::List(msgs) => f.write_str(&msgs.join("; ")),
        }
    }
}

/// Represents all possible errors that can occur within the application.
///
/// Each variant corresponds to a specific type of error, often carrying a message
/// detailing the issue. These errors are then converted into appropriate HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Authentication failed, the token is missing/invalid, or the caller lacks the
    /// required role or ownership (HTTP 401).
    Unauthorized(String),
    /// The request body could not be understood (HTTP 400).
    BadRequest(String),
    /// One or more validation rules failed (HTTP 400).
    ValidationError(ErrorMessage),
    /// A requested resource was not found (HTTP 404).
    NotFound(String),
    /// A unique field already holds the submitted value (HTTP 409).
    Conflict(String),
    /// Represents an unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Represents an error originating from database operations (HTTP 500).
    DatabaseError(String),
}

impl AppError {
    /// Validation failure reporting only one message.
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::ValidationError(ErrorMessage::Single(message.into()))
    }

    /// Whether this error is a system error whose detail must be logged, not shown.
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            AppError::InternalServerError(_) | AppError::DatabaseError(_)
        )
    }

    fn client_message(&self) -> ErrorMessage {
        match self {
            AppError::Unauthorized(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => ErrorMessage::Single(msg.clone()),
            AppError::ValidationError(message) => message.clone(),
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                ErrorMessage::Single(SYSTEM_ERROR_MESSAGE.to_string())
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into error envelopes.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_system() {
            log::error!("{}", self);
        }
        let status = self.status_code();
        HttpResponse::build(status).json(json!({
            "status": false,
            "message": self.client_message(),
            "code": status.as_u16(),
        }))
    }
}

/// Converts storage failures into `AppError`.
///
/// Unique violations surface as conflicts; everything else is a system error.
impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::UniqueViolation(msg) => AppError::Conflict(msg),
            StoreError::ForeignKeyViolation(msg) => AppError::Conflict(msg),
            StoreError::Database(msg) => AppError::DatabaseError(msg),
        }
    }
}

/// Converts `sqlx::Error` into `AppError` through the storage error mapping.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        StoreError::from(error).into()
    }
}

/// Converts `jsonwebtoken::errors::Error` into `AppError::Unauthorized`.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(format!("Invalid token: {:?}", error.kind()))
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::InternalServerError`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(error: AppError) -> serde_json::Value {
        let response = error.error_response();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_responses() {
        let error = AppError::Unauthorized("Invalid token".into());
        assert_eq!(error.error_response().status(), 401);

        let error = AppError::BadRequest("Invalid input".into());
        assert_eq!(error.error_response().status(), 400);

        let error = AppError::invalid("Name is required");
        assert_eq!(error.error_response().status(), 400);

        let error = AppError::NotFound("Resource not found".into());
        assert_eq!(error.error_response().status(), 404);

        let error = AppError::Conflict("Duplicate".into());
        assert_eq!(error.error_response().status(), 409);

        let error = AppError::InternalServerError("Server error".into());
        assert_eq!(error.error_response().status(), 500);
    }

    #[actix_rt::test]
    async fn test_envelope_shape() {
        let json = body_json(AppError::NotFound("Task not found".into())).await;
        assert_eq!(json["status"], false);
        assert_eq!(json["message"], "Task not found");
        assert_eq!(json["code"], 404);
    }

    #[actix_rt::test]
    async fn test_validation_list_is_preserved() {
        let json = body_json(AppError::ValidationError(ErrorMessage::List(vec![
            "Title is required".into(),
            "Invalid status".into(),
        ])))
        .await;
        assert_eq!(
            json["message"],
            serde_json::json!(["Title is required", "Invalid status"])
        );
        assert_eq!(json["code"], 400);
    }

    #[actix_rt::test]
    async fn test_system_errors_hide_detail() {
        let json = body_json(AppError::DatabaseError(
            "relation \"tasks\" does not exist".into(),
        ))
        .await;
        assert_eq!(json["message"], SYSTEM_ERROR_MESSAGE);
        assert_eq!(json["code"], 500);
    }

    #[test]
    fn test_store_error_mapping() {
        let err: AppError = StoreError::UniqueViolation("users_email_key".into()).into();
        assert!(matches!(err, AppError::Conflict(_)));

        let err: AppError = StoreError::Database("connection reset".into()).into();
        assert!(err.is_system());
    }
}
