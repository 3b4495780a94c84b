use chrono::Utc;
use hearth_core::{ContentRef, HouseholdStore};
use hearth_delivery::{FcmClient, TokenOutcome};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::message::{build_payload, DispatchRequest};
use crate::resolver::RecipientResolver;

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub content: ContentRef,
    /// Tokens the provider accepted.
    pub sent: usize,
    /// Tokens a delivery was attempted for.
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub results: Vec<TokenOutcome>,
    /// Stale registrations removed after the run.
    pub pruned: usize,
}

impl DispatchReport {
    fn nothing_to_send(content: ContentRef, reason: &str) -> Self {
        Self {
            content,
            sent: 0,
            total: 0,
            reason: Some(reason.to_string()),
            results: Vec::new(),
            pruned: 0,
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.sent
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// Delete device registrations the provider reports as permanently invalid.
    pub prune_stale_tokens: bool,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self { prune_stale_tokens: true }
    }
}

/// Fans one content event out to the other household members' devices.
///
/// Runs share nothing mutable. Invoking twice for the same content sends
/// twice; de-duplication is the trigger's responsibility.
pub struct PushDispatcher {
    store: Arc<dyn HouseholdStore>,
    resolver: RecipientResolver,
    fcm: FcmClient,
    options: DispatcherOptions,
}

impl PushDispatcher {
    pub fn new(store: Arc<dyn HouseholdStore>, fcm: FcmClient, options: DispatcherOptions) -> Self {
        Self {
            resolver: RecipientResolver::new(store.clone()),
            store,
            fcm,
            options,
        }
    }

    pub async fn dispatch(&self, content: &ContentRef) -> Result<DispatchReport, DispatchError> {
        self.dispatch_request(&DispatchRequest::for_content(content)).await
    }

    pub async fn dispatch_request(&self, request: &DispatchRequest) -> Result<DispatchReport, DispatchError> {
        let content = request.content_ref();
        let span = tracing::info_span!("dispatch", run_id = %Uuid::new_v4(), content = %content);
        self.run(request, content).instrument(span).await
    }

    async fn run(&self, request: &DispatchRequest, content: ContentRef) -> Result<DispatchReport, DispatchError> {
        let set = self.resolver.resolve(&content).await?;

        if let Some(reason) = set.empty_reason() {
            tracing::info!("Nothing to send for {}: {}", content, reason);
            return Ok(DispatchReport::nothing_to_send(content, reason));
        }

        let auth = self.fcm.authorize().await.map_err(|e| {
            tracing::error!("Aborting dispatch for {}: {}", content, e);
            DispatchError::Credential(e)
        })?;

        let payload = build_payload(request, &set, Utc::now());
        let results = self.fcm.deliver(&auth, &set.tokens, &payload).await;

        let sent = results.iter().filter(|r| r.is_delivered()).count();
        let total = results.len();
        tracing::info!(
            "Dispatched {} via {}: {}/{} delivered to {} recipient(s)",
            content,
            self.fcm.protocol().name(),
            sent,
            total,
            set.recipients.len()
        );

        let pruned = self.prune_stale(&results).await;

        Ok(DispatchReport {
            content,
            sent,
            total,
            reason: None,
            results,
            pruned,
        })
    }

    async fn prune_stale(&self, results: &[TokenOutcome]) -> usize {
        if !self.options.prune_stale_tokens {
            return 0;
        }

        let stale: Vec<String> = results
            .iter()
            .filter(|r| r.is_stale())
            .map(|r| r.token.clone())
            .collect();
        if stale.is_empty() {
            return 0;
        }

        match self.store.delete_device_tokens(&stale).await {
            Ok(removed) => {
                tracing::info!("Pruned {} stale device registration(s)", removed);
                removed
            }
            Err(e) => {
                tracing::warn!("Failed to prune {} stale token(s): {}", stale.len(), e);
                0
            }
        }
    }
}
