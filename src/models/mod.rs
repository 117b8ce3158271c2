pub mod attachment;
pub mod category;
pub mod error_log;
pub mod input;
pub mod task;
pub mod template;
pub mod user;

pub use attachment::{Attachment, AttachmentUpload, StoredFile};
pub use category::{Category, CategoryAction, CategoryInsert};
pub use error_log::{ErrorDetails, ErrorLogRecord};
pub use task::{NewTask, Task, TaskListing, TaskQuery, TaskStatus};
pub use template::MailTemplate;
pub use user::{NewUser, Role, User, UserChanges};
