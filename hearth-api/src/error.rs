use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hearth_core::StoreError;
use hearth_delivery::MintError;
use hearth_notify::DispatchError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Dispatch(DispatchError),
    Store(StoreError),
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Dispatch(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Store(e) => store_status(e),
            ApiError::Dispatch(DispatchError::ContentNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Dispatch(DispatchError::Resolution(e)) => store_status(e),
            ApiError::Dispatch(DispatchError::Credential(MintError::Timeout)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Dispatch(DispatchError::Credential(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::BadRequest(msg) => json!({ "error": msg }),
            ApiError::Unauthorized => json!({ "error": "unauthorized" }),
            ApiError::Store(e) => json!({ "error": e.to_string() }),
            ApiError::Dispatch(DispatchError::Credential(MintError::CredentialExchange { status, body })) => {
                json!({
                    "error": "credential exchange failed",
                    "provider_status": status,
                    "provider_error": body,
                })
            }
            ApiError::Dispatch(e) => json!({ "error": e.to_string(), "retryable": e.is_retryable() }),
        };

        if status.is_server_error() {
            tracing::error!("Request failed with {}: {}", status, body);
        }

        (status, Json(body)).into_response()
    }
}
