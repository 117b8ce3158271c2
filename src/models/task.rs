use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use validator::{Validate, ValidationError};

use super::attachment::{validate_attachment, Attachment, AttachmentUpload};
use super::input::{optional_id, optional_text};
use crate::error::AppError;
use crate::validation::{present, rule_error, FieldOrder};

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task is yet to be done.
    Pending,
    /// Task is done.
    Completed,
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(()),
        }
    }
}

/// Represents a task entity as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Task {
    /// Unique identifier for the task.
    pub id: i64,
    /// Identifier of the user who owns the task.
    pub user_id: i64,
    /// The title of the task.
    pub title: String,
    pub description: String,
    /// The current status of the task.
    pub status: TaskStatus,
    pub due_date: NaiveDate,
    pub category_id: i64,
    /// Timestamp of when the task was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update to the task.
    pub updated_at: DateTime<Utc>,
}

/// A task joined with its owner's and category's display names, as listed by the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: Task,
    pub user_name: String,
    pub category_name: String,
    /// Filled in after the join; not part of the row.
    #[sqlx(skip)]
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Validated values for inserting or replacing a task row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub due_date: NaiveDate,
    pub category_id: i64,
}

/// Filters accepted by the task list. Absent filters match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskQuery {
    #[serde(default, deserialize_with = "optional_id")]
    pub task_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_id")]
    pub user_id: Option<i64>,
}

/// Payload for `POST /task/create` and `PATCH /task/update`.
///
/// `id` is only read by the update endpoint.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskRequest {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<i64>,

    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "User ID is required"))]
    pub user_id: Option<i64>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(
        required(message = "Title is required"),
        length(max = 255, message = "Title must be less than 255 characters")
    )]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(required(message = "Description is required"))]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(required(message = "Status is required"), custom = "validate_status")]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    #[validate(required(message = "Due date is required"), custom = "validate_due_date")]
    pub due_date: Option<String>,

    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "Task category is required"))]
    pub category_id: Option<i64>,

    /// Optional file stored alongside the task.
    #[serde(default, skip_serializing)]
    #[validate(custom = "validate_attachment")]
    pub attachment: Option<AttachmentUpload>,
}

impl FieldOrder for TaskRequest {
    const FIELDS: &'static [&'static str] = &[
        "user_id",
        "title",
        "description",
        "status",
        "due_date",
        "category_id",
        "attachment",
    ];
}

impl TaskRequest {
    /// Splits a validated request into the row values and the optional upload.
    pub fn into_parts(self) -> Result<(NewTask, Option<AttachmentUpload>), AppError> {
        let status = present(self.status, "Status is required")?;
        let due_date = present(self.due_date, "Due date is required")?;
        let task = NewTask {
            user_id: present(self.user_id, "User ID is required")?,
            title: present(self.title, "Title is required")?,
            description: present(self.description, "Description is required")?,
            status: status
                .parse()
                .map_err(|_| AppError::invalid("Invalid status"))?,
            due_date: parse_due_date(&due_date)
                .ok_or_else(|| AppError::invalid("Invalid due date"))?,
            category_id: present(self.category_id, "Task category is required")?,
        };
        Ok((task, self.attachment))
    }
}

/// Payload for `DELETE /task/delete`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskIdRequest {
    #[serde(default, deserialize_with = "optional_id")]
    #[validate(required(message = "Task ID is required"))]
    pub id: Option<i64>,
}

impl FieldOrder for TaskIdRequest {
    const FIELDS: &'static [&'static str] = &["id"];
}

/// Parses a due date given as `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, or RFC 3339.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(datetime.date());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|datetime| datetime.date_naive())
}

fn validate_status(status: &str) -> Result<(), ValidationError> {
    status
        .parse::<TaskStatus>()
        .map(|_| ())
        .map_err(|_| rule_error("in", "Invalid status"))
}

fn validate_due_date(due_date: &str) -> Result<(), ValidationError> {
    parse_due_date(due_date)
        .map(|_| ())
        .ok_or_else(|| rule_error("date", "Invalid due date"))
}
