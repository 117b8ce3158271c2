use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use super::input::optional_text;
use crate::validation::{rule_error, FieldOrder, SCHEMA_FIELD};

/// Coarse authorization tag on a user.
/// Corresponds to the `user_role` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    /// May manage categories and every task.
    Admin,
    /// May manage their own tasks and profile.
    User,
}

/// A user account as stored in the database and returned by the API.
///
/// The password hash is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Values for a new `users` row. `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Profile changes; `None` keeps the stored value. `password` is already hashed.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// Signup payload for `POST /create`.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_signup_confirmation", skip_on_field_errors = false))]
pub struct CreateUserRequest {
    #[serde(default, deserialize_with = "optional_text")]
    #[validate(
        required(message = "Name field cannot be blank"),
        length(max = 255, message = "Name must not be greater than 255 characters")
    )]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(
        required(message = "Email field cannot be blank"),
        email(message = "Email must be a valid email address"),
        length(max = 255, message = "Email must not be greater than 255 characters")
    )]
    pub email: Option<String>,

    #[serde(default, skip_serializing)]
    #[validate(
        required(message = "Password field cannot be blank"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: Option<String>,

    #[serde(default, skip_serializing)]
    #[validate(required(message = "Password confirmation field cannot be blank"))]
    pub password_confirmation: Option<String>,
}

impl FieldOrder for CreateUserRequest {
    const FIELDS: &'static [&'static str] = &[
        "name",
        "email",
        "password",
        SCHEMA_FIELD,
        "password_confirmation",
    ];
}

fn validate_signup_confirmation(input: &CreateUserRequest) -> Result<(), ValidationError> {
    confirm(&input.password, &input.password_confirmation)
}

/// Profile update payload for `PATCH /upadteUser`. Every field is optional.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_update_confirmation", skip_on_field_errors = false))]
pub struct UpdateUserRequest {
    #[serde(default, deserialize_with = "optional_text")]
    #[validate(length(max = 255, message = "Name must not be greater than 255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(
        email(message = "Email must be a valid email address"),
        length(max = 255, message = "Email must not be greater than 255 characters")
    )]
    pub email: Option<String>,

    #[serde(default, skip_serializing)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,

    #[serde(default, skip_serializing)]
    pub password_confirmation: Option<String>,
}

impl FieldOrder for UpdateUserRequest {
    const FIELDS: &'static [&'static str] = &["name", "email", "password", SCHEMA_FIELD];
}

fn validate_update_confirmation(input: &UpdateUserRequest) -> Result<(), ValidationError> {
    confirm(&input.password, &input.password_confirmation)
}

fn confirm(password: &Option<String>, confirmation: &Option<String>) -> Result<(), ValidationError> {
    if password.is_some() && password != confirmation {
        return Err(rule_error(
            "confirmed",
            "Password confirmation does not match",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationReport;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn signup(value: serde_json::Value) -> CreateUserRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_signup_validation() {
        let valid = signup(json!({
            "name": "Alice",
            "email": "a@x.com",
            "password": "secret1",
            "password_confirmation": "secret1"
        }));
        assert!(valid.validate().is_ok());

        let report = ValidationReport::check(&signup(json!({ "email": "" })));
        assert_eq!(
            report.messages(),
            &[
                "Name field cannot be blank".to_string(),
                "Email field cannot be blank".to_string(),
                "Password field cannot be blank".to_string(),
                "Password confirmation field cannot be blank".to_string(),
            ]
        );
    }

    #[test]
    fn test_signup_confirmation_mismatch() {
        let report = ValidationReport::check(&signup(json!({
            "name": "Alice",
            "email": "a@x.com",
            "password": "secret1",
            "password_confirmation": "secret2"
        })));
        assert_eq!(
            report.messages(),
            &["Password confirmation does not match".to_string()]
        );
    }

    #[test]
    fn test_update_allows_partial_input() {
        let update: UpdateUserRequest = serde_json::from_value(json!({ "name": "Bob" })).unwrap();
        assert!(update.validate().is_ok());

        let update: UpdateUserRequest =
            serde_json::from_value(json!({ "password": "secret1" })).unwrap();
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_password_is_never_serialized() {
        let user = User {
            id: 1,
            name: "Alice".into(),
            email: "a@x.com".into(),
            password: "$2b$12$hash".into(),
            role: Role::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["role"], "User");
    }
}
