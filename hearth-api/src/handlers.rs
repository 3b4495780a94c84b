use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Json,
};
use hearth_core::types::mask_token;
use hearth_notify::DispatchRequest;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::ApiState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "hearth-api"
    }))
}

/// Runs one dispatch for newly created content.
///
/// Answers 200 whenever the run completes, including when nobody could be
/// notified or some devices rejected the notification.
pub async fn dispatch(
    Extension(state): Extension<ApiState>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.content_id.trim().is_empty() {
        return Err(ApiError::BadRequest("content_id must not be empty".to_string()));
    }

    let report = state.dispatcher.dispatch_request(&request).await?;

    let mut body = json!({
        "ok": true,
        "sent": report.sent,
        "total": report.total,
        "failed": report.failed(),
        "pruned": report.pruned,
        "results": report.results,
    });
    if let Some(reason) = &report.reason {
        body["reason"] = json!(reason);
    }

    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct RegisterDeviceTokenRequest {
    pub user_id: String,
    pub token: String,
    #[serde(default)]
    pub platform: Option<String>,
}

pub async fn register_device_token(
    Extension(state): Extension<ApiState>,
    payload: Result<Json<RegisterDeviceTokenRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user_id = req.user_id.trim();
    let token = req.token.trim();
    if user_id.is_empty() || token.is_empty() {
        return Err(ApiError::BadRequest("user_id and token are required".to_string()));
    }

    state
        .store
        .upsert_device_token(user_id, token, req.platform.as_deref())
        .await?;

    tracing::info!("Registered device {} for user {}", mask_token(token), user_id);
    Ok(Json(json!({ "ok": true })))
}
