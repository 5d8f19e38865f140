use tgf_core::{config::Config, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::router::{build_router, AppState};

/// Serve until `shutdown` is cancelled.
pub async fn serve(cfg: &Config, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let app = build_router(state, &cfg.cors_origins);
    let addr = cfg.bind_addr()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, app = %cfg.app_name, "http_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("http_shutting_down");
        })
        .await?;

    Ok(())
}
