use crate::error::AppError;
use bcrypt::{hash, verify};

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

/// A stored hash that bcrypt cannot parse counts as a mismatch.
pub fn verify_password(password: &str, hashed_password: &str) -> bool {
    match verify(password, hashed_password) {
        Ok(matches) => matches,
        Err(e) => {
            log::warn!("Rejecting unparseable password hash: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing_and_verification() {
        let password = "test_password123";
        let hashed = hash_password(password, 4).unwrap();

        assert!(verify_password(password, &hashed));
        assert!(!verify_password("wrong_password", &hashed));
    }

    #[test]
    fn test_verify_with_invalid_hash() {
        assert!(!verify_password("test_password123", "invalidhashformat"));
    }

    #[test]
    fn test_invalid_cost_is_an_internal_error() {
        match hash_password("secret1", 2) {
            Err(AppError::InternalServerError(msg)) => {
                assert!(msg.contains("Failed to hash password"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
