pub mod error;
pub mod message;
pub mod resolver;
pub mod service;

pub use error::DispatchError;
pub use message::{DispatchRequest, NotificationOverride};
pub use resolver::{RecipientResolver, RecipientSet};
pub use service::{DispatchReport, DispatcherOptions, PushDispatcher};
