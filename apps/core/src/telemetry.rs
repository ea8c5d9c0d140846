//! Tracing subscriber setup for hosts embedding the router.

use crate::config::{LogFormat, RouterConfig};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber.
///
/// The filter honours `RUST_LOG` and defaults to `info`. Returns `false` when a
/// global subscriber was already installed, in which case nothing changes.
pub fn init_tracing(config: &RouterConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = Registry::default().with(filter);

    let result = match config.log_format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Bunyan => registry
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(
                env!("CARGO_PKG_NAME").to_string(),
                std::io::stdout,
            ))
            .try_init(),
    };

    result.is_ok()
}
