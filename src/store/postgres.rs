use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use super::{
    CategoryStore, ErrorLogStore, Ping, StoreError, StoreResult, TaskStore, TemplateStore,
    TokenBlacklist, UserStore,
};
use crate::models::{
    Attachment, Category, CategoryInsert, ErrorDetails, ErrorLogRecord, MailTemplate, NewTask,
    NewUser, StoredFile, Task, TaskListing, TaskQuery, User, UserChanges,
};

const USER_COLUMNS: &str = "id, name, email, password, role, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, name, created_at, updated_at";
const TASK_COLUMNS: &str =
    "id, user_id, title, description, status, due_date, category_id, created_at, updated_at";
const ATTACHMENT_COLUMNS: &str = "id, task_id, filename, path, created_at";

/// PostgreSQL storage backed by a shared `PgPool`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `database_url`.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (name, email, password, role) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), \
             password = COALESCE($4, password), role = COALESCE($5, role), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.email)
            .bind(changes.password)
            .bind(changes.role)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn find_category(&self, id: i64) -> StoreResult<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS);
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn insert_category(&self, name: &str) -> StoreResult<CategoryInsert> {
        let sql = format!(
            "INSERT INTO categories (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING {}",
            CATEGORY_COLUMNS
        );
        let created = sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(category) = created {
            return Ok(CategoryInsert::Created(category));
        }

        let sql = format!("SELECT {} FROM categories WHERE name = $1", CATEGORY_COLUMNS);
        let existing = sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(CategoryInsert::Existing(existing))
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let sql = format!("SELECT {} FROM categories ORDER BY id", CATEGORY_COLUMNS);
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    async fn rename_category(&self, id: i64, name: &str) -> StoreResult<Option<Category>> {
        let sql = format!(
            "UPDATE categories SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(
        &self,
        task: NewTask,
        file: Option<StoredFile>,
    ) -> StoreResult<(Task, Option<Attachment>)> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO tasks (user_id, title, description, status, due_date, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            TASK_COLUMNS
        );
        let created = sqlx::query_as::<_, Task>(&sql)
            .bind(task.user_id)
            .bind(task.title)
            .bind(task.description)
            .bind(task.status)
            .bind(task.due_date)
            .bind(task.category_id)
            .fetch_one(&mut *tx)
            .await?;

        let attachment = match file {
            Some(file) => {
                let sql = format!(
                    "INSERT INTO attachments (task_id, filename, path) VALUES ($1, $2, $3) \
                     RETURNING {}",
                    ATTACHMENT_COLUMNS
                );
                let attachment = sqlx::query_as::<_, Attachment>(&sql)
                    .bind(created.id)
                    .bind(file.filename)
                    .bind(file.path)
                    .fetch_one(&mut *tx)
                    .await?;
                Some(attachment)
            }
            None => None,
        };

        tx.commit().await?;
        Ok((created, attachment))
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn update_task(&self, id: i64, task: NewTask) -> StoreResult<Option<Task>> {
        let sql = format!(
            "UPDATE tasks SET user_id = $2, title = $3, description = $4, status = $5, \
             due_date = $6, category_id = $7, updated_at = NOW() WHERE id = $1 RETURNING {}",
            TASK_COLUMNS
        );
        let updated = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(task.user_id)
            .bind(task.title)
            .bind(task.description)
            .bind(task.status)
            .bind(task.due_date)
            .bind(task.category_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn delete_task(&self, id: i64) -> StoreResult<bool> {
        // Attachments go with the task through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tasks(&self, query: &TaskQuery) -> StoreResult<Vec<TaskListing>> {
        let tasks = sqlx::query_as::<_, TaskListing>(
            "SELECT t.id, t.user_id, t.title, t.description, t.status, t.due_date, \
             t.category_id, t.created_at, t.updated_at, \
             u.name AS user_name, c.name AS category_name \
             FROM tasks t \
             JOIN users u ON u.id = t.user_id \
             JOIN categories c ON c.id = t.category_id \
             WHERE ($1::BIGINT IS NULL OR t.id = $1) \
             AND ($2::BIGINT IS NULL OR t.user_id = $2) \
             ORDER BY t.id DESC",
        )
        .bind(query.task_id)
        .bind(query.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn attachments_for(&self, task_ids: &[i64]) -> StoreResult<Vec<Attachment>> {
        let sql = format!(
            "SELECT {} FROM attachments WHERE task_id = ANY($1) ORDER BY id",
            ATTACHMENT_COLUMNS
        );
        let attachments = sqlx::query_as::<_, Attachment>(&sql)
            .bind(task_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(attachments)
    }
}

#[async_trait]
impl ErrorLogStore for PgStore {
    async fn insert_error_log(&self, details: ErrorDetails) -> StoreResult<ErrorLogRecord> {
        let record = sqlx::query_as::<_, ErrorLogRecord>(
            "INSERT INTO error_logs (error) VALUES ($1) RETURNING id, error, created_at",
        )
        .bind(Json(details))
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_error_logs(&self) -> StoreResult<Vec<ErrorLogRecord>> {
        let records = sqlx::query_as::<_, ErrorLogRecord>(
            "SELECT id, error, created_at FROM error_logs ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

#[async_trait]
impl TemplateStore for PgStore {
    async fn find_template(&self, template_name: &str) -> StoreResult<Option<MailTemplate>> {
        let template = sqlx::query_as::<_, MailTemplate>(
            "SELECT id, template_name, subject, template FROM templates WHERE template_name = $1",
        )
        .bind(template_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(template)
    }
}

#[async_trait]
impl TokenBlacklist for PgStore {
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        // Past its refresh window a token is refused anyway, so its row can go.
        let pruned = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        if pruned.rows_affected() > 0 {
            log::debug!("Pruned {} expired token revocations", pruned.rows_affected());
        }

        let result = sqlx::query(
            "INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2) \
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_token_revoked(&self, jti: Uuid) -> StoreResult<bool> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(revoked)
    }
}

#[async_trait]
impl Ping for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
