//! Tracing subscriber setup.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used by `arena serve` when `RUST_LOG` is unset.
pub const SERVER_FILTER: &str = "arena=info,arena_core=info,tower_http=info";

/// Filter used by the local commands when `RUST_LOG` is unset.
pub const CLI_FILTER: &str = "arena=warn,arena_core=warn";

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn init_tracing(format: LogFormat, default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()?,
    }

    Ok(())
}
