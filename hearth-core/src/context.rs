use std::sync::Arc;
use crate::config::Config;
use crate::db::create_pool as create_db_pool;
use crate::store::{HouseholdStore, PgStore};

/// Process-wide handles shared by every dispatch run.
#[derive(Clone)]
pub struct HearthContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn HouseholdStore>,
}

impl HearthContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = create_db_pool(&config.database).await?;
        let store: Arc<dyn HouseholdStore> = Arc::new(PgStore::new(db_pool));

        Ok(HearthContext {
            config: Arc::new(config),
            store,
        })
    }
}
