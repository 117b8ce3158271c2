use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::policy::require_owner_or_admin;
use crate::error::AppError;
use crate::models::task::{TaskIdRequest, TaskRequest};
use crate::models::{Attachment, Task, TaskListing, TaskQuery, User};
use crate::store::Store;
use crate::uploads::{store_attachment, FileUploader};
use crate::validation::{present, Report, ValidationReport};

pub const TASK_NOT_FOUND: &str = "Task not found";

/// A written task and the attachments stored with it.
#[derive(Debug, Clone, Serialize)]
pub struct TaskWithAttachments {
    #[serde(flatten)]
    pub task: Task,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn Store>,
    uploader: Arc<dyn FileUploader>,
}

impl TaskService {
    pub fn new(store: Arc<dyn Store>, uploader: Arc<dyn FileUploader>) -> Self {
        Self { store, uploader }
    }

    /// Creates a task, storing its attachment first when one is supplied.
    pub async fn create(
        &self,
        user: &User,
        request: TaskRequest,
    ) -> Result<TaskWithAttachments, AppError> {
        let mut report = ValidationReport::check(&request);
        self.check_references(&request, &mut report).await?;
        report.into_result(Report::All)?;

        let (task, upload) = request.into_parts()?;
        require_owner_or_admin(user, task.user_id)?;

        let file = match &upload {
            Some(upload) => Some(store_attachment(self.uploader.as_ref(), upload).await?),
            None => None,
        };
        let (task, attachment) = self.store.insert_task(task, file).await?;
        log::info!("User {} created task {}", user.id, task.id);

        Ok(TaskWithAttachments {
            task,
            attachments: attachment.into_iter().collect(),
        })
    }

    /// Replaces every field of an existing task. Attachments are left untouched.
    pub async fn update(&self, user: &User, request: TaskRequest) -> Result<Task, AppError> {
        let mut report = ValidationReport::default();
        if request.id.is_none() {
            report.push("Task ID is required");
        }
        for message in ValidationReport::check(&request).messages() {
            report.push(message.clone());
        }
        self.check_references(&request, &mut report).await?;
        report.into_result(Report::All)?;

        let id = present(request.id, "Task ID is required")?;
        let (changes, _) = request.into_parts()?;
        let existing = self.find(id).await?;
        require_owner_or_admin(user, existing.user_id)?;
        require_owner_or_admin(user, changes.user_id)?;

        let task = self
            .store
            .update_task(id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound(TASK_NOT_FOUND.into()))?;
        log::info!("User {} updated task {}", user.id, task.id);
        Ok(task)
    }

    pub async fn delete(&self, user: &User, request: TaskIdRequest) -> Result<(), AppError> {
        ValidationReport::check(&request).into_result(Report::All)?;
        let id = present(request.id, "Task ID is required")?;
        let existing = self.find(id).await?;
        require_owner_or_admin(user, existing.user_id)?;

        if !self.store.delete_task(id).await? {
            return Err(AppError::NotFound(TASK_NOT_FOUND.into()));
        }
        log::info!("User {} deleted task {}", user.id, id);
        Ok(())
    }

    /// Lists tasks with owner and category names and their attachments.
    ///
    /// Admins see every task and may filter by `user_id`; other users only see their own.
    pub async fn list(&self, user: &User, mut query: TaskQuery) -> Result<Vec<TaskListing>, AppError> {
        match query.user_id {
            Some(owner) => require_owner_or_admin(user, owner)?,
            None if !user.is_admin() => query.user_id = Some(user.id),
            None => {}
        }

        let mut listings = self.store.list_tasks(&query).await?;
        let ids: Vec<i64> = listings.iter().map(|listing| listing.task.id).collect();
        if ids.is_empty() {
            return Ok(listings);
        }

        let mut by_task: HashMap<i64, Vec<Attachment>> = HashMap::new();
        for attachment in self.store.attachments_for(&ids).await? {
            by_task.entry(attachment.task_id).or_default().push(attachment);
        }
        for listing in &mut listings {
            listing.attachments = by_task.remove(&listing.task.id).unwrap_or_default();
        }
        Ok(listings)
    }

    async fn find(&self, id: i64) -> Result<Task, AppError> {
        self.store
            .find_task(id)
            .await?
            .ok_or_else(|| AppError::NotFound(TASK_NOT_FOUND.into()))
    }

    /// Appends a failure for every referenced user or category that does not exist.
    async fn check_references(
        &self,
        request: &TaskRequest,
        report: &mut ValidationReport,
    ) -> Result<(), AppError> {
        if let Some(user_id) = request.user_id {
            if self.store.find_user(user_id).await?.is_none() {
                report.push("Invalid User ID");
            }
        }
        if let Some(category_id) = request.category_id {
            if self.store.find_category(category_id).await?.is_none() {
                report.push("Invalid category ID");
            }
        }
        Ok(())
    }
}
