pub mod extractors;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod service;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::input::optional_text;
use crate::models::User;
use crate::validation::FieldOrder;

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use service::AuthService;
pub use token::{Claims, IssuedToken, TokenService};

/// Represents the payload for a user login request.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    /// User's email address.
    #[serde(default, deserialize_with = "optional_text")]
    #[validate(
        required(message = "Email is required"),
        email(message = "Email must be a valid email address")
    )]
    pub email: Option<String>,
    /// User's password. Never serialized, so it cannot reach the error log.
    #[serde(default, skip_serializing)]
    #[validate(required(message = "Password is required"))]
    pub password: Option<String>,
}

impl FieldOrder for LoginRequest {
    const FIELDS: &'static [&'static str] = &["email", "password"];
}

/// Payload for `POST /refreshToken`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RefreshRequest {
    #[serde(default, deserialize_with = "optional_text", skip_serializing)]
    #[validate(required(message = "Token is required"))]
    pub token: Option<String>,
}

impl FieldOrder for RefreshRequest {
    const FIELDS: &'static [&'static str] = &["token"];
}

/// Response data after a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: User,
}
