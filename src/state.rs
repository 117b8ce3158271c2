use std::sync::Arc;

use crate::auth::{AuthService, TokenService};
use crate::config::Config;
use crate::error::AppError;
use crate::error_log::ErrorLogger;
use crate::mail::MailNotifier;
use crate::services::{CategoryService, TaskService, UserService};
use crate::store::Store;
use crate::uploads::FileUploader;

/// Everything handlers need, registered once as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
    pub users: UserService,
    pub categories: CategoryService,
    pub tasks: TaskService,
    pub mailer: MailNotifier,
    pub error_log: ErrorLogger,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        mailer: MailNotifier,
        uploader: Arc<dyn FileUploader>,
    ) -> Self {
        Self::assemble(
            store,
            TokenService::from_config(config),
            config.bcrypt_cost,
            config.error_log_utc_offset_minutes,
            mailer,
            uploader,
        )
    }

    /// Seeds what the server needs before it accepts requests: the configured Admin account.
    pub async fn bootstrap(&self, config: &Config) -> Result<(), AppError> {
        if let Some(admin) = &config.admin {
            let user = self.users.ensure_admin(admin).await?;
            log::info!("Admin account {} is ready", user.email);
        }
        Ok(())
    }

    fn assemble(
        store: Arc<dyn Store>,
        tokens: TokenService,
        bcrypt_cost: u32,
        utc_offset_minutes: i32,
        mailer: MailNotifier,
        uploader: Arc<dyn FileUploader>,
    ) -> Self {
        Self {
            auth: AuthService::new(store.clone(), tokens),
            users: UserService::new(store.clone(), mailer.clone(), bcrypt_cost),
            categories: CategoryService::new(store.clone()),
            tasks: TaskService::new(store.clone(), uploader),
            error_log: ErrorLogger::new(store.clone(), utc_offset_minutes),
            mailer,
            store,
        }
    }
}

/// State over `store` with fast hashing, no mail and uploads under the temp dir.
#[cfg(test)]
pub(crate) fn test_state(store: Arc<dyn Store>) -> AppState {
    let dir = std::env::temp_dir().join(format!("tasklane-state-{}", uuid::Uuid::new_v4()));
    AppState::assemble(
        store.clone(),
        TokenService::new("secret", 60, 120),
        4,
        330,
        MailNotifier::new(store, None),
        Arc::new(crate::uploads::LocalUploader::new(dir)),
    )
}
