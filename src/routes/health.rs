use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

/// Readiness check. Answers `503` while storage cannot serve queries.
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let (mut response, status, database) = match state.store.ping().await {
        Ok(()) => (HttpResponse::Ok(), "ok", "up"),
        Err(e) => {
            log::error!("Health check failed: {}", e);
            (HttpResponse::ServiceUnavailable(), "unavailable", "down")
        }
    };
    response.json(json!({
        "status": status,
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now()
    }))
}
