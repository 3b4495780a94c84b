use hearth_delivery::{MintError, ServiceAccountCredential, TokenMinter};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/service_account_key.pem");
const CLIENT_EMAIL: &str = "push@hearth-test.iam.gserviceaccount.com";

fn credential(server: &MockServer) -> ServiceAccountCredential {
    ServiceAccountCredential::from_pem(
        "hearth-test",
        CLIENT_EMAIL,
        TEST_KEY,
        &format!("{}/token", server.uri()),
    )
    .unwrap()
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

fn token_ok(expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": "ya29.test-token",
        "expires_in": expires_in,
        "token_type": "Bearer"
    }))
}

fn assertion_from_form(body: &[u8]) -> String {
    let body = std::str::from_utf8(body).unwrap();
    body.split('&')
        .find_map(|pair| pair.strip_prefix("assertion="))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn mints_token_with_verifiable_assertion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .respond_with(token_ok(3600))
        .expect(1)
        .mount(&server)
        .await;

    let credential = credential(&server);
    let token = TokenMinter::new(http()).mint(&credential).await.unwrap();
    assert_eq!(token.token, "ya29.test-token");
    assert!(token.expires_at > chrono::Utc::now() + chrono::Duration::seconds(3500));

    let requests = server.received_requests().await.unwrap();
    let assertion = assertion_from_form(&requests[0].body);

    // Verify with an independent JWT implementation.
    let public_pem = RsaPrivateKey::from_pkcs8_pem(TEST_KEY)
        .unwrap()
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[credential.token_uri.as_str()]);
    validation.set_issuer(&[CLIENT_EMAIL]);

    let decoded = decode::<serde_json::Value>(
        &assertion,
        &DecodingKey::from_rsa_pem(public_pem.as_bytes()).unwrap(),
        &validation,
    )
    .unwrap();

    assert_eq!(
        decoded.claims["scope"],
        "https://www.googleapis.com/auth/firebase.messaging"
    );
    let iat = decoded.claims["iat"].as_i64().unwrap();
    let exp = decoded.claims["exp"].as_i64().unwrap();
    assert_eq!(exp - iat, 3600);
}

#[tokio::test]
async fn rejection_carries_provider_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&server)
        .await;

    let err = TokenMinter::new(http()).mint(&credential(&server)).await.unwrap_err();
    match err {
        MintError::CredentialExchange { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body["error"], "invalid_grant");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn non_json_rejection_is_kept_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = TokenMinter::new(http()).mint(&credential(&server)).await.unwrap_err();
    assert!(matches!(
        err,
        MintError::CredentialExchange { status: 503, ref body } if body == "upstream unavailable"
    ));
}

#[tokio::test]
async fn slow_token_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_ok(3600).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = TokenMinter::new(http()).mint(&credential(&server)).await.unwrap_err();
    assert!(matches!(err, MintError::Timeout), "got {:?}", err);
}

#[tokio::test]
async fn cached_token_is_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_ok(3600))
        .expect(1)
        .mount(&server)
        .await;

    let minter = TokenMinter::new(http()).with_cache();
    let credential = credential(&server);
    let first = minter.access_token(&credential).await.unwrap();
    let second = minter.access_token(&credential).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn token_inside_refresh_margin_is_reminted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_ok(30))
        .expect(2)
        .mount(&server)
        .await;

    let minter = TokenMinter::new(http()).with_cache();
    let credential = credential(&server);
    minter.access_token(&credential).await.unwrap();
    minter.access_token(&credential).await.unwrap();
}

#[tokio::test]
async fn uncached_minter_mints_every_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_ok(3600))
        .expect(2)
        .mount(&server)
        .await;

    let minter = TokenMinter::new(http());
    let credential = credential(&server);
    minter.access_token(&credential).await.unwrap();
    minter.access_token(&credential).await.unwrap();
}

#[tokio::test]
async fn oversized_lifetime_is_capped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_ok(9_000_000_000_000_000))
        .mount(&server)
        .await;

    let token = TokenMinter::new(http()).mint(&credential(&server)).await.unwrap();
    assert!(token.expires_at <= chrono::Utc::now() + chrono::Duration::seconds(86_400));
    assert!(token.expires_at > chrono::Utc::now() + chrono::Duration::seconds(86_000));
}
