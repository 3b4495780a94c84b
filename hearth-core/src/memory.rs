//! In-process [`HouseholdStore`] for tests, enabled by the `test-util` feature.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::store::{HouseholdStore, StoreError};
use crate::types::{Content, ContentRef, DeviceRegistration, HouseholdMembership};

#[derive(Default)]
pub struct MemoryStore {
    contents: Mutex<Vec<Content>>,
    members: Mutex<Vec<HouseholdMembership>>,
    devices: Mutex<Vec<DeviceRegistration>>,
    profiles: Mutex<Vec<(String, String)>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(self, content: Content) -> Self {
        lock(&self.contents).push(content);
        self
    }

    pub fn with_member(self, household_id: &str, user_id: &str) -> Self {
        lock(&self.members).push(HouseholdMembership {
            household_id: household_id.to_string(),
            user_id: user_id.to_string(),
        });
        self
    }

    pub fn with_device(self, user_id: &str, token: &str) -> Self {
        lock(&self.devices).push(DeviceRegistration {
            user_id: user_id.to_string(),
            token: token.to_string(),
            platform: None,
            updated_at: Utc::now(),
        });
        self
    }

    pub fn with_profile(self, user_id: &str, display_name: &str) -> Self {
        lock(&self.profiles).push((user_id.to_string(), display_name.to_string()));
        self
    }

    /// Makes every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn devices(&self) -> Vec<DeviceRegistration> {
        lock(&self.devices).clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl HouseholdStore for MemoryStore {
    async fn fetch_content(&self, content: &ContentRef) -> Result<Option<Content>, StoreError> {
        self.check()?;
        Ok(lock(&self.contents)
            .iter()
            .find(|c| c.kind == content.kind && c.id == content.id)
            .cloned())
    }

    async fn household_members(&self, household_id: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(lock(&self.members)
            .iter()
            .filter(|m| m.household_id == household_id)
            .map(|m| m.user_id.clone())
            .collect())
    }

    async fn device_tokens(&self, user_ids: &[String]) -> Result<Vec<String>, StoreError> {
        self.check()?;
        let tokens: BTreeSet<String> = lock(&self.devices)
            .iter()
            .filter(|d| user_ids.contains(&d.user_id))
            .map(|d| d.token.clone())
            .collect();
        Ok(tokens.into_iter().collect())
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(lock(&self.profiles)
            .iter()
            .find(|(id, _)| id == user_id)
            .map(|(_, name)| name.clone()))
    }

    async fn upsert_device_token(
        &self,
        user_id: &str,
        token: &str,
        platform: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut devices = lock(&self.devices);
        let now = Utc::now();
        match devices.iter_mut().find(|d| d.user_id == user_id && d.token == token) {
            Some(existing) => {
                existing.platform = platform.map(str::to_string);
                existing.updated_at = now;
            }
            None => devices.push(DeviceRegistration {
                user_id: user_id.to_string(),
                token: token.to_string(),
                platform: platform.map(str::to_string),
                updated_at: now,
            }),
        }
        Ok(())
    }

    async fn delete_device_tokens(&self, tokens: &[String]) -> Result<usize, StoreError> {
        self.check()?;
        let mut devices = lock(&self.devices);
        let before = devices.len();
        devices.retain(|d| !tokens.contains(&d.token));
        Ok(before - devices.len())
    }
}
