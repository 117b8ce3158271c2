//! Resource services: validation, preconditions and storage calls behind each endpoint.

pub mod categories;
pub mod tasks;
pub mod users;

pub use categories::{CategoryOutcome, CategoryService};
pub use tasks::{TaskService, TaskWithAttachments};
pub use users::{Signup, UserService};
