use std::env;

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
/// Logs go to stderr so `--json` output on stdout stays parseable.
pub fn init(level: &str) -> Result<()> {
    let filter = env::var("RUST_LOG")
        .map_or_else(|_| EnvFilter::new(level), |directive| EnvFilter::new(&directive))
        .add_directive(
            "sqlx=warn"
                .parse()
                .unwrap_or_else(|_| tracing::Level::WARN.into()),
        );

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}
