//! Persistent error log.
//!
//! System-class failures are appended to the `error_logs` table together with the
//! request that caused them. Recording never fails the request: a storage error
//! while logging is only reported through `log::error!`.

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde_json::Value;
use std::future::{ready, Future, Ready};
use std::panic::Location;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{ErrorDetails, ErrorLogRecord};
use crate::store::Store;

/// Format of the `timestamp` stored with every record.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Method and full URL of the request being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: String,
    pub url: String,
}

impl FromRequest for RequestMeta {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(RequestMeta {
            method: req.method().to_string(),
            url: req.full_url().to_string(),
        }))
    }
}

#[derive(Clone)]
pub struct ErrorLogger {
    store: Arc<dyn Store>,
    offset: FixedOffset,
}

impl ErrorLogger {
    pub fn new(store: Arc<dyn Store>, utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| {
            log::warn!(
                "Ignoring out of range error log offset {} minutes",
                utc_offset_minutes
            );
            Utc.fix()
        });
        Self { store, offset }
    }

    /// Formats `now` in the configured offset.
    pub fn format_timestamp(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    /// Appends one record.
    pub async fn record(
        &self,
        meta: &RequestMeta,
        params: Value,
        line: String,
        called_from: &str,
        error: &str,
    ) {
        let details = ErrorDetails {
            http_request: meta.method.clone(),
            url: meta.url.clone(),
            params,
            line,
            method: called_from.to_string(),
            error: error.to_string(),
            timestamp: self.format_timestamp(Utc::now()),
        };
        if let Err(e) = self.store.insert_error_log(details).await {
            log::error!("Failed to write error log for {}: {}", called_from, e);
        }
    }

    /// Records `result` when it is a system error, then hands it back unchanged.
    ///
    /// The caller's source location is stored as the record's `line`.
    #[track_caller]
    pub fn observe<'a, T: 'a>(
        &'a self,
        meta: &'a RequestMeta,
        called_from: &'static str,
        params: Value,
        result: Result<T, AppError>,
    ) -> impl Future<Output = Result<T, AppError>> + 'a {
        let location = Location::caller();
        let line = format!("{}:{}", location.file(), location.line());
        async move {
            if let Err(error) = &result {
                if error.is_system() {
                    self.record(meta, params, line, called_from, &error.to_string())
                        .await;
                }
            }
            result
        }
    }

    /// Every record, newest first.
    pub async fn list(&self) -> Result<Vec<ErrorLogRecord>, AppError> {
        Ok(self.store.list_error_logs().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn meta() -> RequestMeta {
        RequestMeta {
            method: "POST".into(),
            url: "http://localhost/task/create".into(),
        }
    }

    #[test]
    fn test_timestamp_uses_configured_offset() {
        let logger = ErrorLogger::new(Arc::new(MemoryStore::new()), 330);
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 20, 0, 0).unwrap();
        assert_eq!(logger.format_timestamp(now), "01-01-2025 01:30:00");
    }

    #[actix_rt::test]
    async fn test_observe_records_only_system_errors() {
        let store = Arc::new(MemoryStore::new());
        let logger = ErrorLogger::new(store.clone(), 0);
        let meta = meta();

        let ok: Result<i32, AppError> = Ok(1);
        assert!(logger.observe(&meta, "tasks::create", json!({}), ok).await.is_ok());

        let not_found: Result<i32, AppError> = Err(AppError::NotFound("Task not found".into()));
        assert!(logger
            .observe(&meta, "tasks::create", json!({}), not_found)
            .await
            .is_err());
        assert!(logger.list().await.unwrap().is_empty());

        let failed: Result<i32, AppError> = Err(AppError::DatabaseError("pool timed out".into()));
        let result = logger
            .observe(&meta, "tasks::create", json!({ "title": "x" }), failed)
            .await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));

        let records = logger.list().await.unwrap();
        assert_eq!(records.len(), 1);
        let details = &records[0].error.0;
        assert_eq!(details.http_request, "POST");
        assert_eq!(details.method, "tasks::create");
        assert_eq!(details.params, json!({ "title": "x" }));
        assert!(details.error.contains("pool timed out"));
        assert!(details.line.contains("error_log.rs"));
    }

    #[actix_rt::test]
    async fn test_request_meta_extractor() {
        let req = actix_web::test::TestRequest::patch()
            .uri("/upadteUser?x=1")
            .to_http_request();
        let meta = RequestMeta::extract(&req).await.unwrap();
        assert_eq!(meta.method, "PATCH");
        assert!(meta.url.ends_with("/upadteUser?x=1"));
    }
}
