use anyhow::Result;
use axum::{
    extract::Extension,
    middleware,
    routing::{get, post},
    Router,
};
use hearth_core::HearthContext;
use hearth_notify::PushDispatcher;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::handlers;
use crate::state::ApiState;

pub fn router(state: ApiState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/dispatch", post(handlers::dispatch))
        .route("/device-tokens", post(handlers::register_device_token))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(Extension(state))
                .layer(middleware::from_fn(auth::auth_middleware)),
        )
}

/// Comma-separated allow-list, or permissive when unset.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some(origins) => {
            let allowed: Vec<axum::http::HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => {
            tracing::warn!("CORS_ORIGINS not set, using permissive CORS");
            CorsLayer::permissive()
        }
    }
}

pub async fn run(
    ctx: HearthContext,
    dispatcher: Arc<PushDispatcher>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let server = &ctx.config.server;
    if server.dispatch_api_key.is_none() {
        tracing::warn!("DISPATCH_API_KEY not set, dispatch endpoints are unauthenticated");
    }

    let state = ApiState {
        dispatcher,
        store: ctx.store.clone(),
        api_key: server.dispatch_api_key.as_deref().map(Arc::from),
    };
    let app = router(state, cors_layer(server.cors_origins.as_deref()));

    let addr: SocketAddr = format!("{}:{}", server.host, server.api_port).parse()?;
    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
