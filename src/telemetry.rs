//! Logging setup for hosts embedding the cache

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global `tracing` subscriber
///
/// `RUST_LOG` directives are honored; the configured level and directives
/// are layered on top. Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {}", e)))
}

/// Parse a level name; unknown names fall back to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env()
        .add_directive(parse_level(&config.level).into())
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("reqwest=info")?);

    for extra in &config.directives {
        filter = filter.add_directive(directive(extra)?);
    }
    Ok(filter)
}

fn directive(raw: &str) -> Result<tracing_subscriber::filter::Directive> {
    raw.parse()
        .map_err(|e| Error::Configuration(format!("Invalid log directive {:?}: {}", raw, e)))
}
