use actix_web::{post, web, HttpResponse};

use super::params;
use crate::auth::{LoginRequest, RefreshRequest};
use crate::error::AppError;
use crate::error_log::RequestMeta;
use crate::response::success;
use crate::state::AppState;

/// Login user
///
/// Exchanges email and password for a bearer token.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    meta: RequestMeta,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let logged = params(&request);
    let result = state.auth.login(request).await;
    let response = state
        .error_log
        .observe(&meta, "auth::login", logged, result)
        .await?;
    Ok(success("LoggedIn", response))
}

/// Refresh token
///
/// Swaps a token still inside its refresh window for a new one.
#[post("/refreshToken")]
pub async fn refresh_token(
    state: web::Data<AppState>,
    meta: RequestMeta,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    let result = state.auth.refresh(body.into_inner()).await;
    let issued = state
        .error_log
        .observe(&meta, "auth::refresh_token", serde_json::Value::Null, result)
        .await?;
    Ok(success("Token refreshed successfully", issued))
}
