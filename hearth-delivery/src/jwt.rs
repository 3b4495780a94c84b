//! Hand-built RS256 JWT assertions for the OAuth 2.0 JWT-bearer grant.
//!
//! A token is `base64url(header) "." base64url(claims) "." base64url(signature)`
//! where the signature is RSASSA-PKCS1-v1_5/SHA-256 over the ASCII bytes of the
//! first two segments exactly as emitted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs1v15::SigningKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use serde::{Deserialize, Serialize};

use crate::error::MintError;

pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

impl JwtHeader {
    pub fn rs256() -> Self {
        Self {
            alg: "RS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl ClaimSet {
    pub fn new(client_email: &str, token_uri: &str, issued_at: i64) -> Self {
        Self {
            iss: client_email.to_string(),
            scope: FCM_SCOPE.to_string(),
            aud: token_uri.to_string(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        }
    }
}

pub fn base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn signing_input(claims: &ClaimSet) -> Result<String, MintError> {
    let header = serde_json::to_vec(&JwtHeader::rs256())?;
    let claims = serde_json::to_vec(claims)?;
    Ok(format!("{}.{}", base64url(&header), base64url(&claims)))
}

pub fn sign_assertion(key: &SigningKey<Sha256>, claims: &ClaimSet) -> Result<String, MintError> {
    let input = signing_input(claims)?;
    let signature = key
        .try_sign(input.as_bytes())
        .map_err(|e| MintError::Signing(e.to_string()))?;
    Ok(format!("{}.{}", input, base64url(&signature.to_bytes())))
}
