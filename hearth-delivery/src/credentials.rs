use hearth_core::config::DeliveryConfig;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::RsaPrivateKey;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::sync::Arc;

use crate::error::CredentialError;

/// A parsed service account. The private key is decoded once at startup.
#[derive(Clone)]
pub struct ServiceAccountCredential {
    pub project_id: String,
    pub client_email: String,
    pub token_uri: String,
    signing_key: SigningKey<Sha256>,
}

impl ServiceAccountCredential {
    /// `private_key_pem` may carry literal `\n` escapes, as it does when the
    /// key is pasted into a single-line environment variable.
    pub fn from_pem(
        project_id: &str,
        client_email: &str,
        private_key_pem: &str,
        token_uri: &str,
    ) -> Result<Self, CredentialError> {
        let pem = normalize_pem(private_key_pem);
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;

        Ok(Self {
            project_id: project_id.to_string(),
            client_email: client_email.to_string(),
            token_uri: token_uri.to_string(),
            signing_key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// Parses a downloaded service-account key file. `token_uri` from the file
    /// wins over `default_token_uri`.
    pub fn from_json(json: &str, default_token_uri: &str) -> Result<Self, CredentialError> {
        #[derive(Deserialize)]
        struct ServiceAccountFile {
            project_id: String,
            client_email: String,
            private_key: String,
            token_uri: Option<String>,
        }

        let file: ServiceAccountFile = serde_json::from_str(json)?;
        Self::from_pem(
            &file.project_id,
            &file.client_email,
            &file.private_key,
            file.token_uri.as_deref().unwrap_or(default_token_uri),
        )
    }

    pub fn signing_key(&self) -> &SigningKey<Sha256> {
        &self.signing_key
    }
}

impl fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// How this process authenticates to the push provider.
#[derive(Clone)]
pub enum DeliveryProtocol {
    /// Legacy HTTP API with a static server key.
    LegacyKey(String),
    /// HTTP v1 API with access tokens minted from a service account.
    ServiceAccount(Arc<ServiceAccountCredential>),
}

impl DeliveryProtocol {
    /// Picks the protocol from configuration. A service account (JSON, file,
    /// or the project/email/key triple) takes precedence over a legacy key.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, CredentialError> {
        if let Some(credential) = service_account_from_config(config)? {
            return Ok(DeliveryProtocol::ServiceAccount(Arc::new(credential)));
        }

        match &config.fcm_server_key {
            Some(key) => Ok(DeliveryProtocol::LegacyKey(key.trim().to_string())),
            None => Err(CredentialError::Missing),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeliveryProtocol::LegacyKey(_) => "legacy",
            DeliveryProtocol::ServiceAccount(_) => "v1",
        }
    }
}

impl fmt::Debug for DeliveryProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryProtocol::LegacyKey(_) => f.write_str("LegacyKey(<redacted>)"),
            DeliveryProtocol::ServiceAccount(c) => f.debug_tuple("ServiceAccount").field(c).finish(),
        }
    }
}

fn service_account_from_config(
    config: &DeliveryConfig,
) -> Result<Option<ServiceAccountCredential>, CredentialError> {
    let json = match (&config.fcm_service_account_json, &config.fcm_service_account_path) {
        (Some(inline), _) => Some(inline.clone()),
        (None, Some(path)) => Some(fs::read_to_string(path).map_err(|source| CredentialError::Read {
            path: path.clone(),
            source,
        })?),
        (None, None) => None,
    };

    if let Some(json) = json {
        let mut credential = ServiceAccountCredential::from_json(&json, &config.token_uri)?;
        if let Some(project_id) = &config.fcm_project_id {
            credential.project_id = project_id.clone();
        }
        return Ok(Some(credential));
    }

    match (&config.fcm_project_id, &config.fcm_client_email, &config.fcm_private_key) {
        (None, None, None) => Ok(None),
        (Some(project_id), Some(client_email), Some(private_key)) => Ok(Some(
            ServiceAccountCredential::from_pem(project_id, client_email, private_key, &config.token_uri)?,
        )),
        (None, _, _) => Err(CredentialError::Incomplete("FCM_PROJECT_ID")),
        (_, None, _) => Err(CredentialError::Incomplete("FCM_CLIENT_EMAIL")),
        (_, _, None) => Err(CredentialError::Incomplete("FCM_PRIVATE_KEY")),
    }
}

fn normalize_pem(raw: &str) -> String {
    raw.trim().trim_matches('"').replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = include_str!("../tests/fixtures/service_account_key.pem");

    fn escaped_key() -> String {
        TEST_KEY.trim_end().replace('\n', "\\n")
    }

    #[test]
    fn normalizes_escaped_newlines() {
        assert_eq!(normalize_pem("\"a\\nb\\n\""), "a\nb\n");
        assert_eq!(normalize_pem(&escaped_key()), TEST_KEY.trim_end());
    }

    #[test]
    fn triple_selects_service_account() {
        let config = DeliveryConfig {
            fcm_project_id: Some("hearth-test".to_string()),
            fcm_client_email: Some("push@hearth-test.iam.gserviceaccount.com".to_string()),
            fcm_private_key: Some(escaped_key()),
            fcm_server_key: Some("legacy".to_string()),
            ..DeliveryConfig::default()
        };

        match DeliveryProtocol::from_config(&config).unwrap() {
            DeliveryProtocol::ServiceAccount(c) => {
                assert_eq!(c.project_id, "hearth-test");
                assert_eq!(c.token_uri, config.token_uri);
            }
            other => panic!("expected service account, got {:?}", other),
        }
    }

    #[test]
    fn json_file_contents_are_accepted() {
        let json = serde_json::json!({
            "type": "service_account",
            "project_id": "from-json",
            "client_email": "push@from-json.iam.gserviceaccount.com",
            "private_key": TEST_KEY,
            "token_uri": "https://example.test/token",
        })
        .to_string();
        let config = DeliveryConfig {
            fcm_service_account_json: Some(json),
            ..DeliveryConfig::default()
        };

        let DeliveryProtocol::ServiceAccount(c) = DeliveryProtocol::from_config(&config).unwrap() else {
            panic!("expected service account");
        };
        assert_eq!(c.project_id, "from-json");
        assert_eq!(c.token_uri, "https://example.test/token");
    }

    #[test]
    fn legacy_key_used_when_no_service_account() {
        let config = DeliveryConfig {
            fcm_server_key: Some("AAAA-server-key".to_string()),
            ..DeliveryConfig::default()
        };
        let protocol = DeliveryProtocol::from_config(&config).unwrap();
        assert_eq!(protocol.name(), "legacy");
        assert_eq!(format!("{:?}", protocol), "LegacyKey(<redacted>)");
    }

    #[test]
    fn partial_triple_is_rejected() {
        let config = DeliveryConfig {
            fcm_project_id: Some("hearth-test".to_string()),
            ..DeliveryConfig::default()
        };
        assert!(matches!(
            DeliveryProtocol::from_config(&config),
            Err(CredentialError::Incomplete("FCM_CLIENT_EMAIL"))
        ));
    }

    #[test]
    fn missing_credentials_are_rejected() {
        assert!(matches!(
            DeliveryProtocol::from_config(&DeliveryConfig::default()),
            Err(CredentialError::Missing)
        ));
    }

    #[test]
    fn garbage_key_is_rejected() {
        let err = ServiceAccountCredential::from_pem("p", "e", "not a key", "https://t").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidKey(_)));
    }
}
