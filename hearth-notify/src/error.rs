use hearth_core::{ContentRef, StoreError};
use hearth_delivery::MintError;
use thiserror::Error;

/// Errors that abort a whole dispatch run. Per-token delivery problems never
/// surface here; they are recorded in the report instead.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{0} not found")]
    ContentNotFound(ContentRef),

    #[error("failed to resolve recipients: {0}")]
    Resolution(#[from] StoreError),

    #[error("failed to obtain push credential: {0}")]
    Credential(#[from] MintError),
}

impl DispatchError {
    /// Whether the caller may retry the same event later.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::ContentNotFound(_) => false,
            DispatchError::Resolution(_) => true,
            DispatchError::Credential(MintError::Timeout | MintError::Transport(_)) => true,
            // Rejected assertions need an operator unless the clock was skewed.
            DispatchError::Credential(_) => false,
        }
    }
}
