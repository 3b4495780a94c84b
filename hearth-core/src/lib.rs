pub mod config;
pub mod context;
pub mod db;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod schema;
pub mod store;
pub mod types;

pub use config::Config;
pub use context::HearthContext;
pub use db::DbPool;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use store::{HouseholdStore, PgStore, StoreError};
pub use types::{Content, ContentKind, ContentRef};
