use std::sync::Arc;

use anyhow::Context;
use tgf_core::{
    config::Config,
    session::{SessionPool, SessionRunner},
};
use tgf_http::AppState;
use tgf_telegram::GrammersConnector;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("loading configuration")?;
    tgf_core::logging::init(&cfg.app_name, &cfg.log_level, cfg.debug)?;

    let connector = GrammersConnector::new(cfg.telegram_api_id, cfg.telegram_api_hash.clone());
    let pool = Arc::new(SessionPool::new());
    let live = pool
        .initialize(&cfg.sessions_dir, &connector)
        .await
        .with_context(|| format!("loading sessions from {}", cfg.sessions_dir.display()))?;
    if live == 0 {
        warn!(path = %cfg.sessions_dir.display(), "starting_without_sessions");
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown_requested");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "signal_handler_unavailable"),
            }
        }
    });

    let state = AppState::new(SessionRunner::new(pool.clone()));
    let served = tgf_http::serve(&cfg, state, shutdown).await;

    pool.shutdown().await;
    served.context("http server failed")?;
    Ok(())
}
