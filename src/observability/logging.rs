//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Change the log level at runtime (`set_log_level` requests)
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level at startup
//! - The filter sits behind a reload layer so clients can turn on debug
//!   logging in a running agent without restarting the host

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

#[derive(Debug, Clone, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("failed to apply log filter: {0}")]
    Reload(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),

    #[error("log level control is not available")]
    Unavailable,
}

/// Runtime log-level switch handed to the agent.
pub trait LogLevelControl: Send + Sync {
    fn set_level(&self, level: &str) -> Result<(), LoggingError>;
}

/// Parse a level name (`error` … `trace`, or `off`).
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    LevelFilter::from_str(level).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

fn directives(level: LevelFilter) -> String {
    format!("inspection_agent={level},tower_http={level},warn")
}

/// Handle to the installed filter.
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelControl for LogHandle {
    fn set_level(&self, level: &str) -> Result<(), LoggingError> {
        let level = parse_level(level)?;
        let filter = EnvFilter::try_new(directives(level))
            .map_err(|e| LoggingError::Reload(e.to_string()))?;
        self.filter
            .reload(filter)
            .map_err(|e| LoggingError::Reload(e.to_string()))
    }
}

/// Install the global subscriber.
pub fn init(default_level: &str) -> Result<LogHandle, LoggingError> {
    let level = parse_level(default_level)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level)));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LogHandle { filter: handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_parse() {
        assert_eq!(parse_level("debug").expect("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level("off").expect("off"), LevelFilter::OFF);
        assert!(matches!(parse_level("chatty"), Err(LoggingError::InvalidLevel(_))));
    }
}
