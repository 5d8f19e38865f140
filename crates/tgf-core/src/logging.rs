use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize logging/tracing for the service.
///
/// `RUST_LOG` wins over `level` when set. JSON lines are emitted unless
/// `human` is requested (debug mode).
pub fn init(service_name: &str, level: &str, human: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},tgf_core={level},tgf_http={level},tgf_telegram={level},{service_name}={level}"
        ))
    });

    let builder = fmt().with_env_filter(filter).with_target(false);
    let installed = if human {
        builder.with_ansi(true).try_init()
    } else {
        builder.json().flatten_event(true).try_init()
    };

    installed.map_err(|e| Error::Config(format!("failed to install log subscriber: {e}")))
}
