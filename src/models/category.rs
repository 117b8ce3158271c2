use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use validator::{Validate, ValidationError};

use super::input::{optional_id, optional_text};
use crate::validation::{rule_error, FieldOrder};

/// A task category. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of an idempotent category insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryInsert {
    Created(Category),
    /// A category with the same name was already stored; nothing was written.
    Existing(Category),
}

/// Operation selected by the `action` field of the category endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryAction {
    /// List every category.
    Get,
    /// Create a category.
    Post,
    /// Rename a category.
    Patch,
    /// Remove a category.
    Delete,
}

impl FromStr for CategoryAction {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(CategoryAction::Get),
            "POST" => Ok(CategoryAction::Post),
            "PATCH" => Ok(CategoryAction::Patch),
            "DELETE" => Ok(CategoryAction::Delete),
            _ => Err(()),
        }
    }
}

/// Payload for `POST /category/create`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CategoryCreateRequest {
    #[serde(default, deserialize_with = "optional_text")]
    #[validate(length(max = 255, message = "Name must not be greater than 255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(
        required(message = "Action is required"),
        custom = "validate_create_action"
    )]
    pub action: Option<String>,
}

impl FieldOrder for CategoryCreateRequest {
    const FIELDS: &'static [&'static str] = &["name", "action"];
}

fn validate_create_action(action: &str) -> Result<(), ValidationError> {
    match action.parse() {
        Ok(CategoryAction::Get | CategoryAction::Post) => Ok(()),
        _ => Err(rule_error("in", "Action must be one of GET, POST")),
    }
}

/// Payload for `POST /category/update`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CategoryUpdateRequest {
    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "Id is required"))]
    pub id: Option<i64>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(length(max = 255, message = "Name must not be greater than 255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(
        required(message = "Action is required"),
        custom = "validate_update_action"
    )]
    pub action: Option<String>,
}

impl FieldOrder for CategoryUpdateRequest {
    const FIELDS: &'static [&'static str] = &["id", "name", "action"];
}

fn validate_update_action(action: &str) -> Result<(), ValidationError> {
    match action.parse() {
        Ok(CategoryAction::Patch | CategoryAction::Delete) => Ok(()),
        _ => Err(rule_error("in", "Action must be one of PATCH, DELETE")),
    }
}
