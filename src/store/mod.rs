//! Storage ports.
//!
//! Services only see `Arc<dyn Store>`. `PgStore` backs it with PostgreSQL and
//! `MemoryStore` keeps everything in process for tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::models::{
    Attachment, Category, CategoryInsert, ErrorDetails, ErrorLogRecord, MailTemplate, NewTask,
    NewUser, StoredFile, Task, TaskListing, TaskQuery, User, UserChanges,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Failures reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique index rejected the write. Carries the constraint name.
    UniqueViolation(String),
    /// A foreign key rejected the write. Carries the constraint name.
    ForeignKeyViolation(String),
    Database(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::UniqueViolation(name) => write!(f, "unique violation on {}", name),
            StoreError::ForeignKeyViolation(name) => write!(f, "foreign key violation on {}", name),
            StoreError::Database(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            let constraint = db.constraint().unwrap_or_default().to_string();
            match db.code().as_deref() {
                Some(PG_UNIQUE_VIOLATION) => return StoreError::UniqueViolation(constraint),
                Some(PG_FOREIGN_KEY_VIOLATION) => {
                    return StoreError::ForeignKeyViolation(constraint)
                }
                _ => {}
            }
        }
        StoreError::Database(error.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Fails with `UniqueViolation` when the email is taken.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    /// Applies `changes`; `None` when no user has `id`.
    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn find_category(&self, id: i64) -> StoreResult<Option<Category>>;

    /// Inserts `name` unless a category with that name exists.
    async fn insert_category(&self, name: &str) -> StoreResult<CategoryInsert>;

    /// All categories, oldest first.
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    async fn rename_category(&self, id: i64, name: &str) -> StoreResult<Option<Category>>;

    /// Fails with `ForeignKeyViolation` while tasks still reference the category.
    async fn delete_category(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Writes the task and, when given, its attachment row in one transaction.
    async fn insert_task(
        &self,
        task: NewTask,
        file: Option<StoredFile>,
    ) -> StoreResult<(Task, Option<Attachment>)>;

    async fn find_task(&self, id: i64) -> StoreResult<Option<Task>>;

    async fn update_task(&self, id: i64, task: NewTask) -> StoreResult<Option<Task>>;

    /// Deletes the task and its attachments.
    async fn delete_task(&self, id: i64) -> StoreResult<bool>;

    /// Tasks joined with owner and category names, newest first.
    async fn list_tasks(&self, query: &TaskQuery) -> StoreResult<Vec<TaskListing>>;

    async fn attachments_for(&self, task_ids: &[i64]) -> StoreResult<Vec<Attachment>>;
}

#[async_trait]
pub trait ErrorLogStore: Send + Sync {
    async fn insert_error_log(&self, details: ErrorDetails) -> StoreResult<ErrorLogRecord>;

    /// Every record, newest first.
    async fn list_error_logs(&self) -> StoreResult<Vec<ErrorLogRecord>>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn find_template(&self, template_name: &str) -> StoreResult<Option<MailTemplate>>;
}

#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Records `jti` as revoked. Returns `false` when it already was.
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> StoreResult<bool>;

    async fn is_token_revoked(&self, jti: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait Ping: Send + Sync {
    /// Succeeds when the backend can serve queries.
    async fn ping(&self) -> StoreResult<()>;
}

/// Everything the services need from storage.
pub trait Store:
    UserStore + CategoryStore + TaskStore + ErrorLogStore + TemplateStore + TokenBlacklist + Ping
{
}

impl<T> Store for T where
    T: UserStore
        + CategoryStore
        + TaskStore
        + ErrorLogStore
        + TemplateStore
        + TokenBlacklist
        + Ping
{
}
