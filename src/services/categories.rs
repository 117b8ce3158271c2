use std::sync::Arc;

use crate::auth::policy::require_admin;
use crate::error::AppError;
use crate::models::category::{CategoryCreateRequest, CategoryUpdateRequest};
use crate::models::{Category, CategoryAction, CategoryInsert, User};
use crate::store::{Store, StoreError};
use crate::validation::{present, Report, ValidationReport};

pub const CATEGORY_NOT_FOUND: &str = "Category not found";

/// What a category endpoint did, and the data it answers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryOutcome {
    Listed(Vec<Category>),
    Created(Category),
    Renamed(Category),
    Deleted,
}

impl CategoryOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CategoryOutcome::Listed(_) => "Categories retrieved successfully",
            CategoryOutcome::Created(_) => "Category created successfully",
            CategoryOutcome::Renamed(_) => "Category updated successfully",
            CategoryOutcome::Deleted => "Category deleted successfully",
        }
    }
}

#[derive(Clone)]
pub struct CategoryService {
    store: Arc<dyn Store>,
}

impl CategoryService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// `action` POST creates a category (idempotent on the name), GET lists them.
    pub async fn create_or_list(
        &self,
        user: &User,
        request: CategoryCreateRequest,
    ) -> Result<CategoryOutcome, AppError> {
        require_admin(user, "You are not authorized to create category")?;
        ValidationReport::check(&request).into_result(Report::First)?;

        match parse_action(request.action)? {
            CategoryAction::Post => {
                let name = present(request.name, "Name is required")?;
                let category = match self.store.insert_category(&name).await? {
                    CategoryInsert::Created(category) => {
                        log::info!("Created category {} ({})", category.id, category.name);
                        category
                    }
                    CategoryInsert::Existing(category) => category,
                };
                Ok(CategoryOutcome::Created(category))
            }
            _ => Ok(CategoryOutcome::Listed(self.store.list_categories().await?)),
        }
    }

    /// `action` PATCH renames a category, DELETE removes it.
    pub async fn update_or_delete(
        &self,
        user: &User,
        request: CategoryUpdateRequest,
    ) -> Result<CategoryOutcome, AppError> {
        require_admin(user, "You are not authorized to update category")?;
        ValidationReport::check(&request).into_result(Report::First)?;
        let id = present(request.id, "Id is required")?;

        match parse_action(request.action)? {
            CategoryAction::Patch => {
                let name = present(request.name, "Name is required")?;
                let category = self
                    .store
                    .rename_category(id, &name)
                    .await
                    .map_err(|error| match error {
                        StoreError::UniqueViolation(_) => {
                            AppError::Conflict("Category already exist".into())
                        }
                        other => other.into(),
                    })?
                    .ok_or_else(|| AppError::NotFound(CATEGORY_NOT_FOUND.into()))?;
                log::info!("Renamed category {} to {}", category.id, category.name);
                Ok(CategoryOutcome::Renamed(category))
            }
            _ => {
                let deleted = self
                    .store
                    .delete_category(id)
                    .await
                    .map_err(|error| match error {
                        StoreError::ForeignKeyViolation(_) => {
                            AppError::Conflict("Category is in use by existing tasks".into())
                        }
                        other => other.into(),
                    })?;
                if !deleted {
                    return Err(AppError::NotFound(CATEGORY_NOT_FOUND.into()));
                }
                log::info!("Deleted category {}", id);
                Ok(CategoryOutcome::Deleted)
            }
        }
    }
}

fn parse_action(action: Option<String>) -> Result<CategoryAction, AppError> {
    present(action, "Action is required")?
        .parse()
        .map_err(|_| AppError::invalid("Invalid action"))
}
