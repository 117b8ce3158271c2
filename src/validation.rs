//! Validation layer.
//!
//! Request types derive `validator::Validate` with a human-readable message on every
//! rule. `ValidationReport` flattens the resulting `ValidationErrors` (a hash map) into
//! a stable list that follows the request type's declared field order, and lets
//! services append the checks that need storage (foreign-key existence).

use std::borrow::Cow;

use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::{AppError, ErrorMessage};

/// Key under which `validator` stores struct-level (schema) errors.
pub const SCHEMA_FIELD: &str = "__all__";

/// Declares the order in which a request's fields are reported.
pub trait FieldOrder {
    /// Field names, including [`SCHEMA_FIELD`] where schema errors belong.
    const FIELDS: &'static [&'static str];
}

/// How many messages a failed validation reports to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// Only the first failing rule.
    First,
    /// Every failing rule.
    All,
}

/// Ordered list of validation failures for one request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    messages: Vec<String>,
}

impl ValidationReport {
    /// Runs the derived rules of `input` and collects their messages.
    pub fn check<T: Validate + FieldOrder>(input: &T) -> Self {
        match input.validate() {
            Ok(()) => Self::default(),
            Err(errors) => Self::from_errors(&errors, T::FIELDS),
        }
    }

    /// Flattens `errors`, listing `fields` first and any other keys alphabetically after.
    pub fn from_errors(errors: &ValidationErrors, fields: &[&str]) -> Self {
        let all = errors.errors();
        let mut keys: Vec<&str> = fields
            .iter()
            .copied()
            .filter(|field| all.contains_key(field))
            .collect();
        let mut rest: Vec<&str> = all
            .keys()
            .copied()
            .filter(|key| !fields.contains(key))
            .collect();
        rest.sort_unstable();
        keys.extend(rest);

        let mut messages = Vec::new();
        for key in keys {
            if let Some(ValidationErrorsKind::Field(field_errors)) = all.get(key) {
                messages.extend(field_errors.iter().map(|error| describe(key, error)));
            }
        }
        Self { messages }
    }

    /// Appends a failure found outside the derived rules.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// `Ok(())` when nothing failed, otherwise a 400 carrying the first or all messages.
    pub fn into_result(self, report: Report) -> Result<(), AppError> {
        let mut messages = self.messages;
        if messages.is_empty() {
            return Ok(());
        }
        let message = match report {
            Report::First => ErrorMessage::Single(messages.swap_remove(0)),
            Report::All => ErrorMessage::List(messages),
        };
        Err(AppError::ValidationError(message))
    }
}

fn describe(field: &str, error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => format!("{}.{}", field, error.code),
    }
}

/// Builds a `ValidationError` carrying its own message, for custom validators.
pub fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Returns the value of a field the derived rules already proved present.
pub fn present<T>(value: Option<T>, message: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::invalid(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Validate)]
    #[validate(schema(function = "same_pin", skip_on_field_errors = false))]
    struct Signup {
        #[validate(required(message = "Name is required"))]
        name: Option<String>,
        #[validate(
            required(message = "Email is required"),
            email(message = "Email is invalid")
        )]
        email: Option<String>,
        pin: Option<String>,
        pin_confirmation: Option<String>,
    }

    impl FieldOrder for Signup {
        const FIELDS: &'static [&'static str] = &["name", "email", "pin", SCHEMA_FIELD];
    }

    fn same_pin(input: &Signup) -> Result<(), ValidationError> {
        if input.pin != input.pin_confirmation {
            return Err(rule_error("confirmed", "Pin confirmation does not match"));
        }
        Ok(())
    }

    fn signup(name: Option<&str>, email: Option<&str>, pin: &str, confirm: &str) -> Signup {
        Signup {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            pin: Some(pin.to_string()),
            pin_confirmation: Some(confirm.to_string()),
        }
    }

    #[test]
    fn test_messages_follow_field_order() {
        let report = ValidationReport::check(&signup(None, Some("nope"), "1", "2"));
        assert_eq!(
            report.messages(),
            &[
                "Name is required".to_string(),
                "Email is invalid".to_string(),
                "Pin confirmation does not match".to_string(),
            ]
        );
    }

    #[test]
    fn test_valid_input_is_empty() {
        let report = ValidationReport::check(&signup(Some("Ann"), Some("a@x.com"), "1", "1"));
        assert!(report.is_empty());
        assert!(report.into_result(Report::All).is_ok());
    }

    #[test]
    fn test_first_and_all_reporting() {
        let mut report = ValidationReport::default();
        report.push("Invalid User ID");
        report.push("Invalid category ID");

        match report.clone().into_result(Report::First) {
            Err(AppError::ValidationError(ErrorMessage::Single(msg))) => {
                assert_eq!(msg, "Invalid User ID")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        match report.into_result(Report::All) {
            Err(AppError::ValidationError(ErrorMessage::List(msgs))) => assert_eq!(msgs.len(), 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_message_falls_back_to_field_and_code() {
        let mut errors = ValidationErrors::new();
        errors.add("title", ValidationError::new("length"));
        let report = ValidationReport::from_errors(&errors, &[]);
        assert_eq!(report.messages(), &["title.length".to_string()]);
    }
}
