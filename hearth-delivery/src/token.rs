use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::credentials::ServiceAccountCredential;
use crate::error::MintError;
use crate::jwt::{sign_assertion, ClaimSet};

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Cached tokens are dropped this long before the provider's expiry.
pub const REFRESH_MARGIN_SECS: i64 = 60;

const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Upper bound on a lifetime reported by the token endpoint.
const MAX_EXPIRES_IN_SECS: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Exchanges self-signed JWT assertions for OAuth access tokens.
pub struct TokenMinter {
    http: reqwest::Client,
    cache: Option<Mutex<HashMap<String, AccessToken>>>,
}

impl TokenMinter {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http, cache: None }
    }

    /// Reuse minted tokens across dispatch runs until shortly before expiry.
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(Mutex::new(HashMap::new()));
        self
    }

    /// Returns a usable token, from the cache when enabled.
    pub async fn access_token(&self, credential: &ServiceAccountCredential) -> Result<AccessToken, MintError> {
        let Some(cache) = &self.cache else {
            return self.mint(credential).await;
        };

        // Held across the exchange so concurrent runs share one refresh.
        let mut cache = cache.lock().await;
        if let Some(token) = cache.get(&credential.client_email) {
            if token.is_fresh_at(Utc::now()) {
                return Ok(token.clone());
            }
        }

        let token = self.mint(credential).await?;
        cache.insert(credential.client_email.clone(), token.clone());
        Ok(token)
    }

    pub async fn mint(&self, credential: &ServiceAccountCredential) -> Result<AccessToken, MintError> {
        self.mint_at(credential, Utc::now()).await
    }

    pub async fn mint_at(
        &self,
        credential: &ServiceAccountCredential,
        now: DateTime<Utc>,
    ) -> Result<AccessToken, MintError> {
        let claims = ClaimSet::new(&credential.client_email, &credential.token_uri, now.timestamp());
        let assertion = sign_assertion(credential.signing_key(), &claims)?;

        tracing::debug!("Exchanging JWT assertion for {} at {}", credential.client_email, credential.token_uri);

        let response = self
            .http
            .post(&credential.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(MintError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
            tracing::error!("Token endpoint rejected assertion with status {}: {}", status, body);
            return Err(MintError::CredentialExchange {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                MintError::Timeout
            } else {
                MintError::MalformedResponse(e.to_string())
            }
        })?;

        let expires_in = token_lifetime(parsed.expires_in);
        tracing::info!("Minted access token for {} (expires in {}s)", credential.client_email, expires_in);

        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        })
    }
}

fn token_lifetime(expires_in: Option<i64>) -> i64 {
    expires_in
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
        .clamp(0, MAX_EXPIRES_IN_SECS)
}
