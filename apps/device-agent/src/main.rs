//! ZiLink device agent entry point.

mod app;
mod config;
mod device;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting ZiLink device agent"
    );

    let config = config::Config::load()?;
    tracing::info!(device = %config.device_id, "configuration loaded");
    if config.auth_token.is_empty() {
        tracing::warn!("auth_token is empty, the server will reject this device");
    }

    // Adapters run on the runtime; the service loop stays on this thread.
    let rt = tokio::runtime::Runtime::new()?;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            cancel.cancel();
        });
    }

    app::run(&config, rt.handle().clone(), &cancel)?;

    tracing::info!("agent shut down cleanly");
    Ok(())
}
