use anyhow::{anyhow, Result};
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use std::sync::Arc;
use tokio::time::Duration;

use crate::config::DatabaseConfig;

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection = Object<AsyncPgConnection>;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Builds the pool and waits until one connection can be checked out.
///
/// The data store may still be starting when the service boots, so the first
/// checkout is retried with exponential backoff (1s, 2s, 4s, ...).
pub async fn create_pool(config: &DatabaseConfig) -> Result<Arc<DbPool>> {
    tracing::info!("Setting up database connection pool ({})", mask_database_url(&config.url));

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.url);
    let pool = Pool::builder(manager)
        .max_size(config.max_connections as usize)
        .build()
        .map_err(|e| anyhow!("Failed to create connection pool: {}", e))?;

    let mut last_error = anyhow!("no connection attempt made");
    for attempt in 1..=CONNECT_ATTEMPTS {
        match tokio::time::timeout(CONNECT_TIMEOUT, pool.get()).await {
            Ok(Ok(_conn)) => {
                tracing::info!("Database connection established on attempt {}", attempt);
                return Ok(Arc::new(pool));
            }
            Ok(Err(e)) => {
                tracing::warn!("Database connection failed on attempt {}: {}", attempt, e);
                last_error = anyhow!("Database connection failed: {}", e);
            }
            Err(_) => {
                tracing::warn!("Database connection timed out on attempt {}", attempt);
                last_error = anyhow!("Database connection timed out");
            }
        }

        if attempt < CONNECT_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt - 1))).await;
        }
    }

    tracing::error!("All {} database connection attempts failed", CONNECT_ATTEMPTS);
    Err(last_error)
}

pub fn mask_database_url(url: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("postgres", url));
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _password)) => format!("{}://{}:****@{}", scheme, user, host),
        None => format!("{}://****@{}", scheme, host),
    }
}
