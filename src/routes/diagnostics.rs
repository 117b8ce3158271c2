use actix_web::{get, http::header::ContentType, web, HttpResponse};
use std::fmt::Write;

use crate::error::AppError;
use crate::html::escape;
use crate::models::ErrorLogRecord;
use crate::state::AppState;

/// HTML view of the error log, newest first.
#[get("/")]
pub async fn error_log(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let records = state.error_log.list().await?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(render(&records)))
}

/// Drops the cached mail templates.
#[get("/cache")]
pub async fn clear_cache(state: web::Data<AppState>) -> HttpResponse {
    state.mailer.clear_cache().await;
    log::info!("Mail template cache cleared");
    HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body("Cache cleared!")
}

fn render(records: &[ErrorLogRecord]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Error log</title></head><body>\
         <h1>Error log</h1><table border=\"1\"><thead><tr>\
         <th>#</th><th>Time</th><th>Request</th><th>URL</th><th>Method</th><th>Line</th>\
         <th>Error</th><th>Params</th></tr></thead><tbody>",
    );
    for record in records {
        let details = &record.error.0;
        // Writing to a String cannot fail.
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><pre>{}</pre></td></tr>",
            record.id,
            escape(&details.timestamp),
            escape(&details.http_request),
            escape(&details.url),
            escape(&details.method),
            escape(&details.line),
            escape(&details.error),
            escape(&details.params.to_string()),
        );
    }
    if records.is_empty() {
        html.push_str("<tr><td colspan=\"8\">No errors recorded</td></tr>");
    }
    html.push_str("</tbody></table></body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_log::RequestMeta;
    use crate::state::test_state;
    use crate::store::MemoryStore;
    use actix_web::{test, App};
    use serde_json::json;
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_error_log_view_escapes_records() {
        let state = test_state(Arc::new(MemoryStore::new()));
        let meta = RequestMeta {
            method: "POST".into(),
            url: "http://localhost/task/create".into(),
        };
        state
            .error_log
            .record(&meta, json!({ "title": "x" }), "src/x.rs:1".into(), "tasks::create", "<script>")
            .await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(error_log)
                .service(clear_cache),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(resp.status().is_success());
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
        assert!(body.contains("tasks::create"));

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/cache").to_request()).await;
        assert_eq!(test::read_body(resp).await, "Cache cleared!");
    }

    #[::core::prelude::v1::test]
    fn test_empty_log() {
        assert!(render(&[]).contains("No errors recorded"));
    }
}
