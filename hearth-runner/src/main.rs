use anyhow::Result;
use hearth_core::{Config, HearthContext};
use hearth_delivery::FcmClient;
use hearth_notify::{DispatcherOptions, PushDispatcher};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    init_tracing();

    tracing::info!("Starting Hearth push dispatcher");

    let config = Config::from_env();

    // Credentials are parsed before anything else so a bad key fails fast.
    let fcm = FcmClient::from_config(&config.delivery)?;
    let options = DispatcherOptions {
        prune_stale_tokens: config.delivery.prune_stale_tokens,
    };

    let ctx = HearthContext::new(config).await?;
    let dispatcher = Arc::new(PushDispatcher::new(ctx.store.clone(), fcm, options));

    tracing::info!("Hearth context initialized");

    hearth_api::run(ctx, dispatcher, shutdown_signal()).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}
