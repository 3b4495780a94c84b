use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use std::sync::Arc;
use thiserror::Error;

use crate::db::{DbConnection, DbPool};
use crate::schema::{devices, household_members, images, messages, profiles};
use crate::types::{Content, ContentKind, ContentRef, ImageRow, MessageRow, NewDeviceRegistration};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("data store unavailable: {0}")]
    Unavailable(String),

    #[error("data store query failed: {0}")]
    Query(#[from] diesel::result::Error),
}

/// Read access to the household tables plus the two device-table writes the
/// pipeline performs (registration upsert and stale-token pruning).
#[async_trait]
pub trait HouseholdStore: Send + Sync {
    async fn fetch_content(&self, content: &ContentRef) -> Result<Option<Content>, StoreError>;

    async fn household_members(&self, household_id: &str) -> Result<Vec<String>, StoreError>;

    /// Distinct device tokens registered to any of `user_ids`.
    async fn device_tokens(&self, user_ids: &[String]) -> Result<Vec<String>, StoreError>;

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    async fn upsert_device_token(
        &self,
        user_id: &str,
        token: &str,
        platform: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Returns the number of rows removed.
    async fn delete_device_tokens(&self, tokens: &[String]) -> Result<usize, StoreError>;
}

/// Postgres-backed store over the shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<DbPool>,
}

impl PgStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<DbConnection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl HouseholdStore for PgStore {
    async fn fetch_content(&self, content: &ContentRef) -> Result<Option<Content>, StoreError> {
        let mut conn = self.conn().await?;

        let found = match content.kind {
            ContentKind::Image => images::table
                .filter(images::id.eq(&content.id))
                .select(ImageRow::as_select())
                .first(&mut conn)
                .await
                .optional()?
                .map(Content::from),
            ContentKind::Message => messages::table
                .filter(messages::id.eq(&content.id))
                .select(MessageRow::as_select())
                .first(&mut conn)
                .await
                .optional()?
                .map(Content::from),
        };

        Ok(found)
    }

    async fn household_members(&self, household_id: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;

        let members = household_members::table
            .filter(household_members::household_id.eq(household_id))
            .select(household_members::user_id)
            .load::<String>(&mut conn)
            .await?;

        Ok(members)
    }

    async fn device_tokens(&self, user_ids: &[String]) -> Result<Vec<String>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;

        let tokens = devices::table
            .filter(devices::user_id.eq_any(user_ids))
            .select(devices::token)
            .distinct()
            .load::<String>(&mut conn)
            .await?;

        Ok(tokens)
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn().await?;

        let name = profiles::table
            .filter(profiles::id.eq(user_id))
            .select(profiles::display_name)
            .first::<Option<String>>(&mut conn)
            .await
            .optional()?;

        Ok(name.flatten())
    }

    async fn upsert_device_token(
        &self,
        user_id: &str,
        token: &str,
        platform: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let now = Utc::now();

        diesel::insert_into(devices::table)
            .values(&NewDeviceRegistration {
                user_id,
                token,
                platform,
                updated_at: now,
            })
            .on_conflict((devices::user_id, devices::token))
            .do_update()
            .set((devices::platform.eq(platform), devices::updated_at.eq(now)))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn delete_device_tokens(&self, tokens: &[String]) -> Result<usize, StoreError> {
        if tokens.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;

        let removed = diesel::delete(devices::table.filter(devices::token.eq_any(tokens)))
            .execute(&mut conn)
            .await?;

        Ok(removed)
    }
}
