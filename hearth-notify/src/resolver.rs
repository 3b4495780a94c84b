use hearth_core::{Content, ContentRef, HouseholdStore};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::DispatchError;

/// Who should hear about a piece of content, and where to reach them.
#[derive(Debug, Clone)]
pub struct RecipientSet {
    pub content: Content,
    /// Household members other than the content owner.
    pub recipients: Vec<String>,
    /// Deduplicated device tokens of `recipients`.
    pub tokens: Vec<String>,
    pub sender_name: Option<String>,
}

impl RecipientSet {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Why nothing will be sent, if that is the case.
    pub fn empty_reason(&self) -> Option<&'static str> {
        if self.recipients.is_empty() {
            Some("no recipients")
        } else if self.tokens.is_empty() {
            Some("no registered devices")
        } else {
            None
        }
    }
}

pub struct RecipientResolver {
    store: Arc<dyn HouseholdStore>,
}

impl RecipientResolver {
    pub fn new(store: Arc<dyn HouseholdStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, content_ref: &ContentRef) -> Result<RecipientSet, DispatchError> {
        let content = self
            .store
            .fetch_content(content_ref)
            .await?
            .ok_or_else(|| DispatchError::ContentNotFound(content_ref.clone()))?;

        let recipients: Vec<String> = self
            .store
            .household_members(&content.household_id)
            .await?
            .into_iter()
            .filter(|member| *member != content.owner_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if recipients.is_empty() {
            tracing::debug!("No other members in household {}", content.household_id);
            return Ok(RecipientSet {
                content,
                recipients,
                tokens: Vec::new(),
                sender_name: None,
            });
        }

        let tokens: Vec<String> = self
            .store
            .device_tokens(&recipients)
            .await?
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let sender_name = if tokens.is_empty() {
            None
        } else {
            // Only decorates the title; a failure here must not cost the send.
            match self.store.display_name(&content.owner_id).await {
                Ok(name) => name.filter(|n| !n.trim().is_empty()),
                Err(e) => {
                    tracing::warn!("Could not load profile for {}: {}", content.owner_id, e);
                    None
                }
            }
        };

        tracing::debug!(
            "Resolved {} recipient(s) with {} device token(s) for {}",
            recipients.len(),
            tokens.len(),
            content_ref
        );

        Ok(RecipientSet {
            content,
            recipients,
            tokens,
            sender_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{ContentKind, MemoryStore, StoreError};

    fn image(id: &str, owner: &str, household: &str) -> Content {
        Content {
            kind: ContentKind::Image,
            id: id.to_string(),
            owner_id: owner.to_string(),
            household_id: household.to_string(),
            display: Some("beach.jpg".to_string()),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn excludes_owner_from_recipients() {
        let store = MemoryStore::new()
            .with_content(image("img_1", "A", "h1"))
            .with_member("h1", "A")
            .with_member("h1", "B")
            .with_member("h1", "C")
            .with_member("h2", "D")
            .with_device("A", "tok_owner")
            .with_device("B", "tok_b")
            .with_device("C", "tok_c")
            .with_device("D", "tok_other_household");

        let set = RecipientResolver::new(Arc::new(store))
            .resolve(&ContentRef::image("img_1"))
            .await
            .unwrap();

        assert_eq!(set.recipients, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(set.tokens, vec!["tok_b".to_string(), "tok_c".to_string()]);
        assert!(set.empty_reason().is_none());
    }

    #[tokio::test]
    async fn single_member_household_is_empty_not_error() {
        let store = MemoryStore::new()
            .with_content(image("img_1", "A", "h1"))
            .with_member("h1", "A")
            .with_device("A", "tok_owner");

        let set = RecipientResolver::new(Arc::new(store))
            .resolve(&ContentRef::image("img_1"))
            .await
            .unwrap();

        assert!(set.is_empty());
        assert_eq!(set.empty_reason(), Some("no recipients"));
    }

    #[tokio::test]
    async fn recipients_without_devices_are_empty() {
        let store = MemoryStore::new()
            .with_content(image("img_1", "A", "h1"))
            .with_member("h1", "A")
            .with_member("h1", "B");

        let set = RecipientResolver::new(Arc::new(store))
            .resolve(&ContentRef::image("img_1"))
            .await
            .unwrap();

        assert!(set.is_empty());
        assert_eq!(set.empty_reason(), Some("no registered devices"));
    }

    #[tokio::test]
    async fn missing_content_is_terminal() {
        let err = RecipientResolver::new(Arc::new(MemoryStore::new()))
            .resolve(&ContentRef::message("nope"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::ContentNotFound(ref c) if c.id == "nope"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn store_outage_is_resolution_error() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let err = RecipientResolver::new(Arc::new(store))
            .resolve(&ContentRef::image("img_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Resolution(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn picks_up_sender_display_name() {
        let store = MemoryStore::new()
            .with_content(image("img_1", "A", "h1"))
            .with_member("h1", "A")
            .with_member("h1", "B")
            .with_device("B", "tok_b")
            .with_profile("A", "Alex");

        let set = RecipientResolver::new(Arc::new(store))
            .resolve(&ContentRef::image("img_1"))
            .await
            .unwrap();

        assert_eq!(set.sender_name.as_deref(), Some("Alex"));
    }
}
