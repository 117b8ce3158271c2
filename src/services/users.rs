use std::sync::Arc;

use crate::auth::hash_password;
use crate::config::AdminConfig;
use crate::error::AppError;
use crate::mail::{MailError, MailNotifier, WELCOME_TEMPLATE};
use crate::models::user::{CreateUserRequest, UpdateUserRequest};
use crate::models::{NewUser, Role, User, UserChanges};
use crate::store::{Store, StoreError};
use crate::validation::{present, Report, ValidationReport};

pub const EMAIL_TAKEN: &str = "User with this email already exists";
pub const USER_NOT_FOUND: &str = "User not found";

/// Result of a signup. The account exists even when the welcome mail failed.
#[derive(Debug)]
pub struct Signup {
    pub user: User,
    pub mail_error: Option<MailError>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    mailer: MailNotifier,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, mailer: MailNotifier, bcrypt_cost: u32) -> Self {
        Self {
            store,
            mailer,
            bcrypt_cost,
        }
    }

    /// Registers a new `User` account and sends the welcome mail when mail is configured.
    pub async fn create(&self, request: CreateUserRequest) -> Result<Signup, AppError> {
        ValidationReport::check(&request).into_result(Report::All)?;
        let name = present(request.name, "Name field cannot be blank")?;
        let email = present(request.email, "Email field cannot be blank")?;
        let password = present(request.password, "Password field cannot be blank")?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(EMAIL_TAKEN.into()));
        }

        let user = self
            .store
            .insert_user(NewUser {
                name,
                email,
                password: hash_password(&password, self.bcrypt_cost)?,
                role: Role::User,
            })
            .await
            .map_err(email_conflict)?;
        log::info!("Created user {}", user.id);

        let mail_error = if self.mailer.is_enabled() {
            self.mailer
                .send_mail(WELCOME_TEMPLATE, &user.name, &user.email)
                .await
                .err()
        } else {
            None
        };
        if let Some(error) = &mail_error {
            log::error!("Welcome mail to user {} failed: {}", user.id, error);
        }

        Ok(Signup { user, mail_error })
    }

    pub async fn profile(&self, user: &User) -> Result<User, AppError> {
        self.store
            .find_user(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))
    }

    /// Applies the given profile changes to `user`.
    pub async fn update(&self, user: &User, request: UpdateUserRequest) -> Result<User, AppError> {
        ValidationReport::check(&request).into_result(Report::All)?;

        if let Some(email) = &request.email {
            if let Some(existing) = self.store.find_user_by_email(email).await? {
                if existing.id != user.id {
                    return Err(AppError::Conflict(EMAIL_TAKEN.into()));
                }
            }
        }

        let password = match request.password {
            Some(password) => Some(hash_password(&password, self.bcrypt_cost)?),
            None => None,
        };
        let changes = UserChanges {
            name: request.name,
            email: request.email,
            password,
            role: None,
        };

        let updated = self
            .store
            .update_user(user.id, changes)
            .await
            .map_err(email_conflict)?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;
        log::info!("Updated user {}", updated.id);
        Ok(updated)
    }

    /// Makes sure the configured account exists with the Admin role.
    ///
    /// An existing account keeps its password and is only promoted.
    pub async fn ensure_admin(&self, admin: &AdminConfig) -> Result<User, AppError> {
        if let Some(existing) = self.store.find_user_by_email(&admin.email).await? {
            if existing.is_admin() {
                return Ok(existing);
            }
            let changes = UserChanges {
                role: Some(Role::Admin),
                ..UserChanges::default()
            };
            let promoted = self
                .store
                .update_user(existing.id, changes)
                .await?
                .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;
            log::info!("Promoted user {} to Admin", promoted.id);
            return Ok(promoted);
        }

        let user = self
            .store
            .insert_user(NewUser {
                name: admin.name.clone(),
                email: admin.email.clone(),
                password: hash_password(&admin.password, self.bcrypt_cost)?,
                role: Role::Admin,
            })
            .await
            .map_err(email_conflict)?;
        log::info!("Created Admin user {}", user.id);
        Ok(user)
    }
}

fn email_conflict(error: StoreError) -> AppError {
    match error {
        StoreError::UniqueViolation(_) => AppError::Conflict(EMAIL_TAKEN.into()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::error::ErrorMessage;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service(store: Arc<MemoryStore>) -> UserService {
        UserService::new(store.clone(), MailNotifier::new(store, None), 4)
    }

    fn signup(email: &str) -> CreateUserRequest {
        serde_json::from_value(json!({
            "name": "Alice",
            "email": email,
            "password": "secret1",
            "password_confirmation": "secret1"
        }))
        .unwrap()
    }

    #[actix_rt::test]
    async fn test_create_hashes_password() {
        let users = service(Arc::new(MemoryStore::new()));
        let signup = users.create(signup("a@x.com")).await.unwrap();
        assert_eq!(signup.user.role, Role::User);
        assert!(signup.mail_error.is_none());
        assert!(verify_password("secret1", &signup.user.password));
    }

    #[actix_rt::test]
    async fn test_duplicate_email_is_conflict() {
        let users = service(Arc::new(MemoryStore::new()));
        users.create(signup("a@x.com")).await.unwrap();
        match users.create(signup("a@x.com")).await {
            Err(AppError::Conflict(msg)) => assert_eq!(msg, EMAIL_TAKEN),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_create_reports_every_failure() {
        let users = service(Arc::new(MemoryStore::new()));
        let request: CreateUserRequest =
            serde_json::from_value(json!({ "email": "bad" })).unwrap();
        match users.create(request).await {
            Err(AppError::ValidationError(ErrorMessage::List(msgs))) => {
                assert_eq!(msgs[0], "Name field cannot be blank");
                assert!(msgs.contains(&"Email must be a valid email address".to_string()));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_update_rechecks_email() {
        let users = service(Arc::new(MemoryStore::new()));
        let alice = users.create(signup("a@x.com")).await.unwrap().user;
        users.create(signup("b@x.com")).await.unwrap();

        let taken: UpdateUserRequest =
            serde_json::from_value(json!({ "email": "b@x.com" })).unwrap();
        assert!(matches!(
            users.update(&alice, taken).await,
            Err(AppError::Conflict(_))
        ));

        let rename: UpdateUserRequest =
            serde_json::from_value(json!({ "name": "Alicia", "email": "a@x.com" })).unwrap();
        let updated = users.update(&alice, rename).await.unwrap();
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.email, "a@x.com");
    }

    #[actix_rt::test]
    async fn test_update_password() {
        let users = service(Arc::new(MemoryStore::new()));
        let alice = users.create(signup("a@x.com")).await.unwrap().user;
        let request: UpdateUserRequest = serde_json::from_value(json!({
            "password": "changed1",
            "password_confirmation": "changed1"
        }))
        .unwrap();
        let updated = users.update(&alice, request).await.unwrap();
        assert!(verify_password("changed1", &updated.password));
        assert_eq!(users.profile(&alice).await.unwrap().password, updated.password);
    }

    fn admin(email: &str) -> AdminConfig {
        AdminConfig {
            name: "Root".into(),
            email: email.into(),
            password: "rootpass".into(),
        }
    }

    #[actix_rt::test]
    async fn test_ensure_admin_creates_the_account_once() {
        let users = service(Arc::new(MemoryStore::new()));
        let created = users.ensure_admin(&admin("root@x.com")).await.unwrap();
        assert_eq!(created.role, Role::Admin);
        assert_eq!(created.name, "Root");
        assert!(verify_password("rootpass", &created.password));

        let again = users.ensure_admin(&admin("root@x.com")).await.unwrap();
        assert_eq!(again.id, created.id);
        assert_eq!(again.password, created.password);
    }

    #[actix_rt::test]
    async fn test_ensure_admin_promotes_existing_user() {
        let users = service(Arc::new(MemoryStore::new()));
        let alice = users.create(signup("a@x.com")).await.unwrap().user;

        let promoted = users.ensure_admin(&admin("a@x.com")).await.unwrap();
        assert_eq!(promoted.id, alice.id);
        assert_eq!(promoted.role, Role::Admin);
        assert!(verify_password("secret1", &promoted.password));
        assert!(users.profile(&alice).await.unwrap().is_admin());
    }
}
