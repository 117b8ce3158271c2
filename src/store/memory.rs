use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CategoryStore, ErrorLogStore, Ping, StoreError, StoreResult, TaskStore, TemplateStore,
    TokenBlacklist, UserStore,
};
use crate::models::{
    Attachment, Category, CategoryInsert, ErrorDetails, ErrorLogRecord, MailTemplate, NewTask,
    NewUser, StoredFile, Task, TaskListing, TaskQuery, User, UserChanges,
};
use crate::mail::WELCOME_TEMPLATE;
use sqlx::types::Json;

// Mirrors the row seeded by migrations/0001_init.sql.
const WELCOME_SUBJECT: &str = "Welcome to Tasklane";
const WELCOME_BODY: &str = "<p>Hi [[name]],</p><p>Your account is ready. \
Sign in to start organising your tasks.</p>";

#[derive(Default)]
struct State {
    next_id: i64,
    users: Vec<User>,
    categories: Vec<Category>,
    tasks: Vec<Task>,
    attachments: Vec<Attachment>,
    error_logs: Vec<ErrorLogRecord>,
    templates: Vec<MailTemplate>,
    revoked: HashMap<Uuid, DateTime<Utc>>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process storage with the same constraints and seed data as the PostgreSQL schema.
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut state = State::default();
        let id = state.next_id();
        state.templates.push(MailTemplate {
            id,
            template_name: WELCOME_TEMPLATE.to_string(),
            subject: WELCOME_SUBJECT.to_string(),
            template: WELCOME_BODY.to_string(),
        });
        Self {
            state: Mutex::new(state),
        }
    }

    /// Adds or replaces a mail template.
    pub async fn put_template(&self, template_name: &str, subject: &str, template: &str) {
        let mut state = self.state.lock().await;
        state.templates.retain(|t| t.template_name != template_name);
        let id = state.next_id();
        state.templates.push(MailTemplate {
            id,
            template_name: template_name.to_string(),
            subject: subject.to_string(),
            template: template.to_string(),
        });
    }

    /// Number of stored tasks.
    pub async fn task_count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    /// Number of stored categories.
    pub async fn category_count(&self) -> usize {
        self.state.lock().await.categories.len()
    }
}

fn check_task_references(state: &State, task: &NewTask) -> StoreResult<()> {
    if !state.users.iter().any(|u| u.id == task.user_id) {
        return Err(StoreError::ForeignKeyViolation("tasks_user_id_fkey".into()));
    }
    if !state.categories.iter().any(|c| c.id == task.category_id) {
        return Err(StoreError::ForeignKeyViolation(
            "tasks_category_id_fkey".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".into()));
        }
        let now = Utc::now();
        let user = User {
            id: state.next_id(),
            name: user.name,
            email: user.email,
            password: user.password,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut state = self.state.lock().await;
        if let Some(email) = &changes.email {
            if state.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::UniqueViolation("users_email_key".into()));
            }
        }
        let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(password) = changes.password {
            user.password = password;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn find_category(&self, id: i64) -> StoreResult<Option<Category>> {
        let state = self.state.lock().await;
        Ok(state.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_category(&self, name: &str) -> StoreResult<CategoryInsert> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.categories.iter().find(|c| c.name == name) {
            return Ok(CategoryInsert::Existing(existing.clone()));
        }
        let now = Utc::now();
        let category = Category {
            id: state.next_id(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.categories.push(category.clone());
        Ok(CategoryInsert::Created(category))
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        Ok(self.state.lock().await.categories.clone())
    }

    async fn rename_category(&self, id: i64, name: &str) -> StoreResult<Option<Category>> {
        let mut state = self.state.lock().await;
        if state.categories.iter().any(|c| c.id != id && c.name == name) {
            return Err(StoreError::UniqueViolation("categories_name_key".into()));
        }
        let Some(category) = state.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        category.name = name.to_string();
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if state.tasks.iter().any(|t| t.category_id == id) {
            return Err(StoreError::ForeignKeyViolation(
                "tasks_category_id_fkey".into(),
            ));
        }
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        Ok(state.categories.len() < before)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(
        &self,
        task: NewTask,
        file: Option<StoredFile>,
    ) -> StoreResult<(Task, Option<Attachment>)> {
        let mut state = self.state.lock().await;
        check_task_references(&state, &task)?;

        let now = Utc::now();
        let created = Task {
            id: state.next_id(),
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            status: task.status,
            due_date: task.due_date,
            category_id: task.category_id,
            created_at: now,
            updated_at: now,
        };
        state.tasks.push(created.clone());

        let attachment = file.map(|file| Attachment {
            id: state.next_id(),
            task_id: created.id,
            filename: file.filename,
            path: file.path,
            created_at: now,
        });
        if let Some(attachment) = &attachment {
            state.attachments.push(attachment.clone());
        }
        Ok((created, attachment))
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<Task>> {
        let state = self.state.lock().await;
        Ok(state.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn update_task(&self, id: i64, task: NewTask) -> StoreResult<Option<Task>> {
        let mut state = self.state.lock().await;
        check_task_references(&state, &task)?;
        let Some(stored) = state.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        stored.user_id = task.user_id;
        stored.title = task.title;
        stored.description = task.description;
        stored.status = task.status;
        stored.due_date = task.due_date;
        stored.category_id = task.category_id;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn delete_task(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        if state.tasks.len() == before {
            return Ok(false);
        }
        state.attachments.retain(|a| a.task_id != id);
        Ok(true)
    }

    async fn list_tasks(&self, query: &TaskQuery) -> StoreResult<Vec<TaskListing>> {
        let state = self.state.lock().await;
        let mut listings = Vec::new();
        for task in state.tasks.iter().rev() {
            if query.task_id.map_or(false, |id| id != task.id)
                || query.user_id.map_or(false, |id| id != task.user_id)
            {
                continue;
            }
            let user = state.users.iter().find(|u| u.id == task.user_id);
            let category = state.categories.iter().find(|c| c.id == task.category_id);
            if let (Some(user), Some(category)) = (user, category) {
                listings.push(TaskListing {
                    task: task.clone(),
                    user_name: user.name.clone(),
                    category_name: category.name.clone(),
                    attachments: Vec::new(),
                });
            }
        }
        Ok(listings)
    }

    async fn attachments_for(&self, task_ids: &[i64]) -> StoreResult<Vec<Attachment>> {
        let state = self.state.lock().await;
        Ok(state
            .attachments
            .iter()
            .filter(|a| task_ids.contains(&a.task_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ErrorLogStore for MemoryStore {
    async fn insert_error_log(&self, details: ErrorDetails) -> StoreResult<ErrorLogRecord> {
        let mut state = self.state.lock().await;
        let record = ErrorLogRecord {
            id: state.next_id(),
            error: Json(details),
            created_at: Utc::now(),
        };
        state.error_logs.push(record.clone());
        Ok(record)
    }

    async fn list_error_logs(&self) -> StoreResult<Vec<ErrorLogRecord>> {
        let state = self.state.lock().await;
        Ok(state.error_logs.iter().rev().cloned().collect())
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn find_template(&self, template_name: &str) -> StoreResult<Option<MailTemplate>> {
        let state = self.state.lock().await;
        Ok(state
            .templates
            .iter()
            .find(|t| t.template_name == template_name)
            .cloned())
    }
}

#[async_trait]
impl TokenBlacklist for MemoryStore {
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        state.revoked.retain(|_, until| *until > now);
        Ok(state.revoked.insert(jti, expires_at).is_none())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> StoreResult<bool> {
        Ok(self.state.lock().await.revoked.contains_key(&jti))
    }
}

#[async_trait]
impl Ping for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TaskStatus};
    use chrono::NaiveDate;

    async fn seeded() -> (MemoryStore, User, Category) {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser {
                name: "Alice".into(),
                email: "a@x.com".into(),
                password: "hash".into(),
                role: Role::User,
            })
            .await
            .unwrap();
        let category = match store.insert_category("Work").await.unwrap() {
            CategoryInsert::Created(category) => category,
            CategoryInsert::Existing(_) => panic!("fresh store"),
        };
        (store, user, category)
    }

    fn new_task(user_id: i64, category_id: i64) -> NewTask {
        NewTask {
            user_id,
            title: "Write report".into(),
            description: "Quarterly".into(),
            status: TaskStatus::Pending,
            due_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            category_id,
        }
    }

    #[tokio::test]
    async fn test_email_is_unique() {
        let (store, _, _) = seeded().await;
        let err = store
            .insert_user(NewUser {
                name: "Other".into(),
                email: "a@x.com".into(),
                password: "hash".into(),
                role: Role::User,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_category_insert_is_idempotent() {
        let (store, _, category) = seeded().await;
        match store.insert_category("Work").await.unwrap() {
            CategoryInsert::Existing(existing) => assert_eq!(existing.id, category.id),
            CategoryInsert::Created(_) => panic!("duplicate category created"),
        }
        assert_eq!(store.category_count().await, 1);
    }

    #[tokio::test]
    async fn test_task_foreign_keys_are_enforced() {
        let (store, user, category) = seeded().await;
        let err = store
            .insert_task(new_task(user.id, category.id + 100), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
        assert_eq!(store.task_count().await, 0);
    }

    #[tokio::test]
    async fn test_listing_joins_names_and_deletes_cascade() {
        let (store, user, category) = seeded().await;
        let file = StoredFile {
            filename: "a.txt".into(),
            path: "/uploads/a.txt".into(),
        };
        let (task, attachment) = store
            .insert_task(new_task(user.id, category.id), Some(file))
            .await
            .unwrap();
        assert!(attachment.is_some());

        let listing = store
            .list_tasks(&TaskQuery {
                task_id: Some(task.id),
                user_id: None,
            })
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].user_name, "Alice");
        assert_eq!(listing[0].category_name, "Work");

        let err = store.delete_category(category.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));

        assert!(store.delete_task(task.id).await.unwrap());
        assert!(store.attachments_for(&[task.id]).await.unwrap().is_empty());
        assert!(!store.delete_task(task.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_welcome_template_is_seeded() {
        let store = MemoryStore::new();
        let template = store.find_template(WELCOME_TEMPLATE).await.unwrap().unwrap();
        assert_eq!(template.subject, "Welcome to Tasklane");
        assert_eq!(
            template.render("Ann"),
            "<p>Hi Ann,</p><p>Your account is ready. Sign in to start organising your tasks.</p>"
        );
        assert!(store.find_template("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoked_tokens() {
        let store = MemoryStore::new();
        let jti = Uuid::new_v4();
        let until = Utc::now() + chrono::Duration::minutes(5);
        assert!(!store.is_token_revoked(jti).await.unwrap());
        assert!(store.revoke_token(jti, until).await.unwrap());
        assert!(!store.revoke_token(jti, until).await.unwrap());
        assert!(store.is_token_revoked(jti).await.unwrap());
    }
}
