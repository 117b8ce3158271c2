//! Templated transactional mail through Brevo.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::MailConfig;
use crate::error::AppError;
use crate::models::MailTemplate;
use crate::store::{Store, StoreError};

/// Template sent after a successful signup.
pub const WELCOME_TEMPLATE: &str = "welcome";

#[derive(Debug)]
pub enum MailError {
    /// No Brevo API key is configured.
    NotConfigured,
    TemplateNotFound(String),
    Store(StoreError),
    Transport(String),
    /// Brevo answered with a non-success status.
    Rejected { status: u16, body: String },
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MailError::NotConfigured => write!(f, "mail delivery is not configured"),
            MailError::TemplateNotFound(name) => write!(f, "mail template `{}` not found", name),
            MailError::Store(e) => write!(f, "failed to load mail template: {}", e),
            MailError::Transport(e) => write!(f, "failed to reach mail provider: {}", e),
            MailError::Rejected { status, body } => {
                write!(f, "mail provider rejected message ({}): {}", status, body)
            }
        }
    }
}

impl std::error::Error for MailError {}

impl From<StoreError> for MailError {
    fn from(error: StoreError) -> Self {
        MailError::Store(error)
    }
}

impl From<reqwest::Error> for MailError {
    fn from(error: reqwest::Error) -> Self {
        MailError::Transport(error.to_string())
    }
}

impl From<MailError> for AppError {
    fn from(error: MailError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MailReceipt {
    #[serde(rename = "messageId")]
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SmtpEmail<'a> {
    sender: &'a Contact,
    reply_to: &'a Contact,
    to: Vec<Contact>,
    subject: &'a str,
    html_content: String,
}

/// Minimal client for Brevo's `POST /v3/smtp/email`.
#[derive(Clone)]
pub struct BrevoClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    sender: Contact,
}

impl BrevoClient {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            sender: Contact {
                name: config.sender_name.clone(),
                email: config.sender_email.clone(),
            },
        })
    }

    pub async fn send(
        &self,
        to: Contact,
        subject: &str,
        html_content: String,
    ) -> Result<MailReceipt, MailError> {
        let payload = SmtpEmail {
            sender: &self.sender,
            reply_to: &self.sender,
            to: vec![to],
            subject,
            html_content,
        };
        let response = self
            .client
            .post(format!("{}/v3/smtp/email", self.base_url))
            .header("api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<MailReceipt>().await?)
    }
}

/// Renders stored templates and hands them to Brevo.
///
/// Templates are cached in process until [`MailNotifier::clear_cache`].
#[derive(Clone)]
pub struct MailNotifier {
    store: Arc<dyn Store>,
    client: Option<BrevoClient>,
    cache: Arc<RwLock<HashMap<String, MailTemplate>>>,
}

impl MailNotifier {
    pub fn new(store: Arc<dyn Store>, client: Option<BrevoClient>) -> Self {
        Self {
            store,
            client,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub async fn send_mail(
        &self,
        template_key: &str,
        recipient_name: &str,
        recipient_email: &str,
    ) -> Result<MailReceipt, MailError> {
        let client = self.client.as_ref().ok_or(MailError::NotConfigured)?;
        let template = self.template(template_key).await?;
        let receipt = client
            .send(
                Contact {
                    name: recipient_name.to_string(),
                    email: recipient_email.to_string(),
                },
                &template.subject,
                template.render(recipient_name),
            )
            .await?;
        log::info!(
            "Sent `{}` mail to {} (message {})",
            template_key,
            recipient_email,
            receipt.message_id
        );
        Ok(receipt)
    }

    /// Drops every cached template.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    async fn template(&self, template_key: &str) -> Result<MailTemplate, MailError> {
        if let Some(template) = self.cache.read().await.get(template_key) {
            return Ok(template.clone());
        }
        let template = self
            .store
            .find_template(template_key)
            .await?
            .ok_or_else(|| MailError::TemplateNotFound(template_key.to_string()))?;
        self.cache
            .write()
            .await
            .insert(template_key.to_string(), template.clone());
        Ok(template)
    }
}
