use anyhow::{anyhow, Result};
use futures::stream::{self, StreamExt};
use hearth_core::config::DeliveryConfig;
use hearth_core::types::mask_token;
use serde::Deserialize;
use std::time::Duration;

use crate::credentials::DeliveryProtocol;
use crate::error::MintError;
use crate::outcome::{is_transient_error, TokenOutcome};
use crate::payload::PushPayload;
use crate::token::TokenMinter;

/// The legacy endpoint accepts at most this many `registration_ids` per call.
pub const LEGACY_BATCH_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct FcmSettings {
    pub base_url: String,
    pub android_channel_id: String,
    pub request_timeout: Duration,
    pub max_concurrency: usize,
    pub cache_access_token: bool,
}

impl From<&DeliveryConfig> for FcmSettings {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            base_url: config.fcm_base_url.trim_end_matches('/').to_string(),
            android_channel_id: config.android_channel_id.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_concurrency: config.max_concurrency.max(1),
            cache_access_token: config.cache_access_token,
        }
    }
}

/// Credential resolved once per dispatch run and reused for every token.
#[derive(Clone)]
pub enum Authorization {
    LegacyKey(String),
    Bearer { access_token: String, project_id: String },
}

#[derive(Debug, Deserialize)]
struct V1SendResponse {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct V1ErrorEnvelope {
    error: V1Error,
}

#[derive(Debug, Deserialize)]
struct V1Error {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    details: Vec<V1ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct V1ErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyResponse {
    #[serde(default)]
    results: Vec<LegacyResult>,
}

#[derive(Debug, Deserialize)]
struct LegacyResult {
    message_id: Option<String>,
    error: Option<String>,
}

pub struct FcmClient {
    http: reqwest::Client,
    protocol: DeliveryProtocol,
    minter: TokenMinter,
    settings: FcmSettings,
}

impl FcmClient {
    pub fn new(protocol: DeliveryProtocol, settings: FcmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let minter = TokenMinter::new(http.clone());
        let minter = if settings.cache_access_token {
            minter.with_cache()
        } else {
            minter
        };

        tracing::info!("FCM client initialized ({} protocol, {})", protocol.name(), settings.base_url);

        Ok(Self {
            http,
            protocol,
            minter,
            settings,
        })
    }

    pub fn from_config(config: &DeliveryConfig) -> Result<Self> {
        let protocol = DeliveryProtocol::from_config(config)?;
        Self::new(protocol, FcmSettings::from(config))
    }

    pub fn protocol(&self) -> &DeliveryProtocol {
        &self.protocol
    }

    pub async fn authorize(&self) -> Result<Authorization, MintError> {
        match &self.protocol {
            DeliveryProtocol::LegacyKey(key) => Ok(Authorization::LegacyKey(key.clone())),
            DeliveryProtocol::ServiceAccount(credential) => {
                let token = self.minter.access_token(credential).await?;
                Ok(Authorization::Bearer {
                    access_token: token.token,
                    project_id: credential.project_id.clone(),
                })
            }
        }
    }

    /// Sends `payload` to every token. Never fails as a whole: each token's
    /// result is reported independently, in no particular order.
    pub async fn deliver(
        &self,
        auth: &Authorization,
        tokens: &[String],
        payload: &PushPayload,
    ) -> Vec<TokenOutcome> {
        match auth {
            Authorization::Bearer { access_token, project_id } => {
                stream::iter(tokens)
                    .map(|token| self.send_v1(access_token, project_id, token, payload))
                    .buffer_unordered(self.settings.max_concurrency)
                    .boxed()
                    .collect()
                    .await
            }
            Authorization::LegacyKey(key) => {
                let batches: Vec<Vec<TokenOutcome>> = stream::iter(tokens.chunks(LEGACY_BATCH_LIMIT))
                    .map(|batch| self.send_legacy(key, batch, payload))
                    .buffer_unordered(self.settings.max_concurrency)
                    .boxed()
                    .collect()
                    .await;
                batches.into_iter().flatten().collect()
            }
        }
    }

    async fn send_v1(
        &self,
        access_token: &str,
        project_id: &str,
        token: &str,
        payload: &PushPayload,
    ) -> TokenOutcome {
        let url = format!("{}/v1/projects/{}/messages:send", self.settings.base_url, project_id);

        let response = match self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&payload.v1_request(token))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("FCM request for {} failed: {}", mask_token(token), e);
                return TokenOutcome::from_transport_error(token, &e);
            }
        };

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .json::<V1SendResponse>()
                .await
                .ok()
                .and_then(|r| r.name);
            tracing::debug!("FCM accepted notification for {}", mask_token(token));
            return TokenOutcome::delivered(token, message_id);
        }

        let text = response.text().await.unwrap_or_default();
        let reason = v1_error_reason(&text).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        tracing::warn!("FCM rejected {} ({}): {}", mask_token(token), status, reason);
        TokenOutcome::rejected(token, status.as_u16(), reason)
    }

    async fn send_legacy(&self, key: &str, batch: &[String], payload: &PushPayload) -> Vec<TokenOutcome> {
        let url = format!("{}/fcm/send", self.settings.base_url);

        let response = match self
            .http
            .post(&url)
            .header("Authorization", format!("key={}", key))
            .json(&payload.legacy_request(batch, &self.settings.android_channel_id))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Legacy FCM request for {} tokens failed: {}", batch.len(), e);
                return batch
                    .iter()
                    .map(|token| TokenOutcome::from_transport_error(token, &e))
                    .collect();
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let reason = if text.trim().is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                text.trim().to_string()
            };
            tracing::warn!("Legacy FCM rejected batch of {} ({}): {}", batch.len(), status, reason);
            return batch
                .iter()
                .map(|token| TokenOutcome::batch_rejected(token, status.as_u16(), reason.clone()))
                .collect();
        }

        let results = match response.json::<LegacyResponse>().await {
            Ok(parsed) => parsed.results,
            Err(e) => {
                let reason = format!("unreadable legacy response: {}", e);
                return batch
                    .iter()
                    .map(|token| TokenOutcome::failed(token, reason.clone(), e.is_timeout()))
                    .collect();
            }
        };

        // `results` is positional: entry i answers registration_ids[i].
        batch
            .iter()
            .enumerate()
            .map(|(i, token)| match results.get(i) {
                Some(LegacyResult { error: Some(error), .. }) if is_transient_error(error) => {
                    tracing::warn!("Legacy FCM could not deliver to {} yet: {}", mask_token(token), error);
                    TokenOutcome::failed(token, error.clone(), false)
                }
                Some(LegacyResult { error: Some(error), .. }) => {
                    tracing::warn!("Legacy FCM rejected {}: {}", mask_token(token), error);
                    TokenOutcome::rejected(token, status.as_u16(), error.clone())
                }
                Some(LegacyResult { message_id, .. }) => TokenOutcome::delivered(token, message_id.clone()),
                None => TokenOutcome::failed(token, "missing result entry".to_string(), false),
            })
            .collect()
    }
}

/// Most specific error code in a v1 error body: the FCM `errorCode` detail,
/// then the RPC status, then the message.
fn v1_error_reason(body: &str) -> Option<String> {
    let envelope: V1ErrorEnvelope = serde_json::from_str(body).ok()?;
    let error = envelope.error;
    error
        .details
        .into_iter()
        .find_map(|d| d.error_code)
        .or(error.status)
        .or(error.message)
}
