use actix_web::{post, web, HttpResponse};

use super::params;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::error_log::RequestMeta;
use crate::models::category::{CategoryCreateRequest, CategoryUpdateRequest};
use crate::response::success;
use crate::services::CategoryOutcome;
use crate::state::AppState;

/// `action: "POST"` creates a category, `action: "GET"` lists them. Admin only.
#[post("/create")]
pub async fn create(
    state: web::Data<AppState>,
    meta: RequestMeta,
    user: AuthenticatedUser,
    body: web::Json<CategoryCreateRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let logged = params(&request);
    let result = state.categories.create_or_list(&user.0, request).await;
    let outcome = state
        .error_log
        .observe(&meta, "categories::create", logged, result)
        .await?;
    Ok(respond(outcome))
}

/// `action: "PATCH"` renames category `id`, `action: "DELETE"` removes it. Admin only.
#[post("/update")]
pub async fn update(
    state: web::Data<AppState>,
    meta: RequestMeta,
    user: AuthenticatedUser,
    body: web::Json<CategoryUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let logged = params(&request);
    let result = state.categories.update_or_delete(&user.0, request).await;
    let outcome = state
        .error_log
        .observe(&meta, "categories::update", logged, result)
        .await?;
    Ok(respond(outcome))
}

fn respond(outcome: CategoryOutcome) -> HttpResponse {
    let message = outcome.message();
    match outcome {
        CategoryOutcome::Listed(categories) => success(message, categories),
        CategoryOutcome::Created(category) | CategoryOutcome::Renamed(category) => {
            success(message, category)
        }
        CategoryOutcome::Deleted => success(message, ()),
    }
}
