use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;

use super::middleware::MISSING_TOKEN;
use super::token::Claims;
use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// The user behind the request's bearer token.
///
/// Only usable on routes wrapped in `AuthMiddleware`, which verifies the token and
/// leaves its claims in the request extensions. Extraction then rejects revoked
/// tokens and tokens whose subject no longer exists.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<Claims>().cloned();
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move { resolve(claims, state).await.map_err(ActixError::from) })
    }
}

async fn resolve(
    claims: Option<Claims>,
    state: Option<web::Data<AppState>>,
) -> Result<AuthenticatedUser, AppError> {
    let claims = claims.ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.into()))?;
    let state = state
        .ok_or_else(|| AppError::InternalServerError("AppState is not registered".into()))?;
    let user = state.auth.authenticate(&claims).await?;
    Ok(AuthenticatedUser(user))
}
