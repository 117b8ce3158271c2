use actix_web::{post, route, web, HttpResponse};

use super::params;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::error_log::RequestMeta;
use crate::models::task::{TaskIdRequest, TaskRequest};
use crate::models::TaskQuery;
use crate::response::success;
use crate::state::AppState;

/// Creates a task for `user_id`, with an optional base64 `attachment`.
///
/// ## Responses:
/// - `200 OK`: the task and its attachments.
/// - `400 Bad Request`: every failed rule, including unknown `user_id` or `category_id`.
/// - `401 Unauthorized`: missing token, or `user_id` is another user and the caller is not an Admin.
#[post("/create")]
pub async fn create(
    state: web::Data<AppState>,
    meta: RequestMeta,
    user: AuthenticatedUser,
    body: web::Json<TaskRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let logged = params(&request);
    let result = state.tasks.create(&user.0, request).await;
    let created = state
        .error_log
        .observe(&meta, "tasks::create", logged, result)
        .await?;
    Ok(success("Task created successfully", created))
}

/// Replaces the fields of task `id`.
#[route("/update", method = "PATCH", method = "POST")]
pub async fn update(
    state: web::Data<AppState>,
    meta: RequestMeta,
    user: AuthenticatedUser,
    body: web::Json<TaskRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let logged = params(&request);
    let result = state.tasks.update(&user.0, request).await;
    let updated = state
        .error_log
        .observe(&meta, "tasks::update", logged, result)
        .await?;
    Ok(success("Task updated successfully", updated))
}

#[route("/delete", method = "DELETE", method = "POST")]
pub async fn delete(
    state: web::Data<AppState>,
    meta: RequestMeta,
    user: AuthenticatedUser,
    body: web::Json<TaskIdRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let logged = params(&request);
    let result = state.tasks.delete(&user.0, request).await;
    state
        .error_log
        .observe(&meta, "tasks::delete", logged, result)
        .await?;
    Ok(success("Task deleted successfully", ()))
}

/// Lists tasks, filtered by `task_id` and `user_id` from the query string or a JSON body.
///
/// An empty body means no body filters. A body that is not a valid filter object
/// is rejected the same way a bad query string is.
#[route("/taskList", method = "GET", method = "POST")]
pub async fn list(
    state: web::Data<AppState>,
    meta: RequestMeta,
    user: AuthenticatedUser,
    query: web::Query<TaskQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let mut filters = query.into_inner();
    if let Some(body) = body_filters(&body)? {
        filters.task_id = body.task_id.or(filters.task_id);
        filters.user_id = body.user_id.or(filters.user_id);
    }
    let logged = params(&filters);
    let result = state.tasks.list(&user.0, filters).await;
    let tasks = state
        .error_log
        .observe(&meta, "tasks::list", logged, result)
        .await?;
    Ok(success("Tasks retrieved successfully", tasks))
}

fn body_filters(body: &[u8]) -> Result<Option<TaskQuery>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
}
