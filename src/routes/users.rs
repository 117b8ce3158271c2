use actix_web::{get, post, web, HttpResponse};
use serde_json::json;

use super::params;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::error_log::RequestMeta;
use crate::models::user::{CreateUserRequest, UpdateUserRequest};
use crate::response::success;
use crate::state::AppState;

/// Signup
///
/// Creates a `User` account. A failed welcome mail is written to the error log
/// but does not fail the signup.
#[post("/create")]
pub async fn create(
    state: web::Data<AppState>,
    meta: RequestMeta,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let logged = params(&request);
    let result = state.users.create(request).await;
    let signup = state
        .error_log
        .observe(&meta, "users::create", logged.clone(), result)
        .await?;

    if let Some(error) = &signup.mail_error {
        state
            .error_log
            .record(
                &meta,
                logged,
                format!("{}:{}", file!(), line!()),
                "mail::send_mail",
                &error.to_string(),
            )
            .await;
    }
    Ok(success("User created successfully", signup.user))
}

/// Profile of the caller.
#[get("/profile", wrap = "crate::auth::AuthMiddleware")]
pub async fn profile(
    state: web::Data<AppState>,
    meta: RequestMeta,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let result = state.users.profile(&user.0).await;
    let profile = state
        .error_log
        .observe(&meta, "users::profile", json!({ "id": user.0.id }), result)
        .await?;
    Ok(success("Profile retrieved successfully", profile))
}

/// Update the caller's profile. Served on `/upadteUser` and `/updateUser`.
pub async fn update(
    state: web::Data<AppState>,
    meta: RequestMeta,
    user: AuthenticatedUser,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let logged = params(&request);
    let result = state.users.update(&user.0, request).await;
    let updated = state
        .error_log
        .observe(&meta, "users::update", logged, result)
        .await?;
    Ok(success("User updated successfully", updated))
}
