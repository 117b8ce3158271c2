use std::sync::Arc;

use super::password::verify_password;
use super::token::{Claims, IssuedToken, TokenService};
use super::{LoginRequest, LoginResponse, RefreshRequest};
use crate::error::AppError;
use crate::models::User;
use crate::store::Store;
use crate::validation::{present, Report, ValidationReport};

const INVALID_CREDENTIALS: &str = "Unauthorized";

/// Issues, refreshes and resolves bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Exchanges email and password for an access token.
    ///
    /// Unknown email and wrong password fail the same way.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        ValidationReport::check(&request).into_result(Report::First)?;
        let email = present(request.email, "Email is required")?;
        let password = present(request.password, "Password is required")?;

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) if verify_password(&password, &user.password) => user,
            _ => {
                log::warn!("Rejected login for {}", email);
                return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
            }
        };

        let token = self.tokens.issue(user.id)?;
        log::info!("User {} logged in", user.id);
        Ok(LoginResponse { token, user })
    }

    /// Swaps a token still inside its refresh window for a new one.
    ///
    /// The old token's id is revoked, so each token refreshes at most once.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<IssuedToken, AppError> {
        ValidationReport::check(&request).into_result(Report::First)?;
        let token = present(request.token, "Token is required")?;
        let claims = self.tokens.verify_for_refresh(&token)?;

        if self.store.find_user(claims.sub).await?.is_none() {
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        let revoked = self
            .store
            .revoke_token(claims.jti, self.tokens.refresh_deadline(&claims))
            .await?;
        if !revoked {
            log::warn!("Refused reuse of revoked token {}", claims.jti);
            return Err(AppError::Unauthorized("Token has been revoked".into()));
        }

        let issued = self.tokens.issue(claims.sub)?;
        log::info!("Refreshed token for user {}", claims.sub);
        Ok(issued)
    }

    /// Resolves verified claims to the user they were issued for.
    pub async fn authenticate(&self, claims: &Claims) -> Result<User, AppError> {
        if self.store.is_token_revoked(claims.jti).await? {
            return Err(AppError::Unauthorized("Token has been revoked".into()));
        }
        self.store
            .find_user(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))
    }
}
