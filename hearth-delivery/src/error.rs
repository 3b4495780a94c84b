use thiserror::Error;

/// Startup-time problems with the configured push credentials.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("no FCM credentials configured (set FCM_SERVER_KEY or a service account)")]
    Missing,

    #[error("incomplete service account configuration: {0} is not set")]
    Incomplete(&'static str),

    #[error("failed to read service account file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid service account JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid service account private key: {0}")]
    InvalidKey(String),
}

/// Failures while obtaining an OAuth access token for the v1 API.
#[derive(Error, Debug)]
pub enum MintError {
    #[error("failed to encode JWT segment: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to sign JWT assertion: {0}")]
    Signing(String),

    /// The token endpoint answered with a non-2xx status. `body` is the
    /// provider's JSON error document, or the raw text as a JSON string.
    #[error("token endpoint rejected the assertion ({status}): {body}")]
    CredentialExchange { status: u16, body: serde_json::Value },

    #[error("token endpoint timed out")]
    Timeout,

    #[error("token endpoint request failed: {0}")]
    Transport(String),

    #[error("unexpected token endpoint response: {0}")]
    MalformedResponse(String),
}

impl MintError {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MintError::Timeout
        } else {
            MintError::Transport(err.to_string())
        }
    }
}
