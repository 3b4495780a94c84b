pub mod credentials;
pub mod error;
pub mod fcm;
pub mod jwt;
pub mod outcome;
pub mod payload;
pub mod token;

pub use credentials::{DeliveryProtocol, ServiceAccountCredential};
pub use error::{CredentialError, MintError};
pub use fcm::{Authorization, FcmClient, FcmSettings};
pub use outcome::{DeliveryStatus, TokenOutcome};
pub use payload::PushPayload;
pub use token::{AccessToken, TokenMinter};
