pub mod auth;
pub mod categories;
pub mod diagnostics;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::{error, web, HttpRequest};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthMiddleware;
use crate::error::AppError;

/// Registers every endpoint. Tasks and categories sit behind `AuthMiddleware`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(health::health)
        .service(diagnostics::error_log)
        .service(diagnostics::clear_cache)
        .service(users::create)
        .service(users::profile)
        .service(
            web::resource(["/upadteUser", "/updateUser"])
                .wrap(AuthMiddleware)
                .route(web::patch().to(users::update)),
        )
        .service(auth::login)
        .service(auth::refresh_token)
        .service(
            web::scope("/task")
                .wrap(AuthMiddleware)
                .service(tasks::create)
                .service(tasks::update)
                .service(tasks::delete)
                .service(tasks::list),
        )
        .service(
            web::scope("/category")
                .wrap(AuthMiddleware)
                .service(categories::create)
                .service(categories::update),
        );
}

/// Unreadable JSON bodies answer with the error envelope instead of actix's plain text.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        log::warn!("Rejected body for {}: {}", req.path(), err);
        AppError::BadRequest(format!("Invalid request body: {}", err)).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req: &HttpRequest| {
        log::warn!("Rejected query for {}: {}", req.path(), err);
        error::Error::from(AppError::BadRequest(format!(
            "Invalid query string: {}",
            err
        )))
    })
}

/// Request parameters as stored in the error log. Secrets are never serialized.
pub(crate) fn params<T: Serialize>(request: &T) -> Value {
    serde_json::to_value(request).unwrap_or(Value::Null)
}
