use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::html::escape;

/// Placeholder replaced with the recipient's name.
pub const NAME_PLACEHOLDER: &str = "[[name]]";

/// An HTML mail template keyed by `template_name`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct MailTemplate {
    pub id: i64,
    pub template_name: String,
    pub subject: String,
    pub template: String,
}

impl MailTemplate {
    /// Renders the body for `name`, which is escaped as HTML text.
    pub fn render(&self, name: &str) -> String {
        self.template.replace(NAME_PLACEHOLDER, &escape(name))
    }
}
