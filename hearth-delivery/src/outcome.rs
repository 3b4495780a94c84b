use serde::Serialize;

/// Provider error codes meaning the token will never work again.
const PERMANENT_ERRORS: &[&str] = &["UNREGISTERED", "NotRegistered", "InvalidRegistration"];

/// Legacy per-token codes that mean "try again later", not a refusal.
const TRANSIENT_ERRORS: &[&str] = &["Unavailable", "InternalServerError"];

pub fn is_permanent_error(code: &str) -> bool {
    PERMANENT_ERRORS.contains(&code)
}

pub fn is_transient_error(code: &str) -> bool {
    TRANSIENT_ERRORS.contains(&code)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered {
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    /// The provider answered but refused this token.
    Rejected {
        http_status: u16,
        reason: String,
        permanent: bool,
    },
    /// No usable answer: connection error, timeout, or unreadable response.
    Failed { reason: String, timed_out: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenOutcome {
    pub token: String,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

impl TokenOutcome {
    pub fn delivered(token: &str, message_id: Option<String>) -> Self {
        Self {
            token: token.to_string(),
            status: DeliveryStatus::Delivered { message_id },
        }
    }

    /// Permanence comes from the provider's error code alone; a bare HTTP
    /// status says nothing about the token itself.
    pub fn rejected(token: &str, http_status: u16, reason: String) -> Self {
        let permanent = is_permanent_error(&reason);
        Self {
            token: token.to_string(),
            status: DeliveryStatus::Rejected {
                http_status,
                reason,
                permanent,
            },
        }
    }

    /// The whole request was refused, so this token was never judged.
    pub fn batch_rejected(token: &str, http_status: u16, reason: String) -> Self {
        Self {
            token: token.to_string(),
            status: DeliveryStatus::Rejected {
                http_status,
                reason,
                permanent: false,
            },
        }
    }

    pub fn failed(token: &str, reason: String, timed_out: bool) -> Self {
        Self {
            token: token.to_string(),
            status: DeliveryStatus::Failed { reason, timed_out },
        }
    }

    pub fn from_transport_error(token: &str, err: &reqwest::Error) -> Self {
        Self::failed(token, err.to_string(), err.is_timeout())
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DeliveryStatus::Delivered { .. })
    }

    /// True when the token should be removed from the device registry.
    pub fn is_stale(&self) -> bool {
        matches!(self.status, DeliveryStatus::Rejected { permanent: true, .. })
    }
}
