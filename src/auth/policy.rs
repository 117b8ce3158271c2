//! Role and ownership checks applied before mutations.

use crate::error::AppError;
use crate::models::User;

/// Admin-only operations.
pub fn require_admin(user: &User, message: &str) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        log::warn!("User {} denied admin operation", user.id);
        Err(AppError::Unauthorized(message.to_string()))
    }
}

/// Operations on a resource owned by `owner_id`. Admins may act on any owner.
pub fn require_owner_or_admin(user: &User, owner_id: i64) -> Result<(), AppError> {
    if user.is_admin() || user.id == owner_id {
        Ok(())
    } else {
        log::warn!("User {} denied access to resources of user {}", user.id, owner_id);
        Err(AppError::Unauthorized(
            "You are not authorized to perform this action".into(),
        ))
    }
}
