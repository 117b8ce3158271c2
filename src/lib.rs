#![doc = "The `tasklane` library crate."]
#![doc = ""]
#![doc = "Task management API: users, categories, tasks with attachments, JWT bearer"]
#![doc = "authentication, a uniform response envelope, a persistent error log and"]
#![doc = "templated signup mail. `main.rs` wires it to configuration and runs the server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod error_log;
pub mod html;
pub mod mail;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod uploads;
pub mod validation;

pub use crate::error::AppError;
pub use crate::state::AppState;
