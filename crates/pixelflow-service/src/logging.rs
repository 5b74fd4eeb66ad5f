//! Tracing subscriber setup. Logs go to stderr so stdout carries only
//! JSON responses.

use std::io;

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install subscriber: {0}")]
    Install(String),
}

/// `RUST_LOG` when set and non-empty, otherwise `fallback`.
pub fn filter_directives(fallback: &str) -> String {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => fallback.to_string(),
    }
}

/// Install the global subscriber. `verbose` raises the fallback to debug.
pub fn init(fallback: &str, verbose: bool) -> Result<(), LoggingError> {
    let fallback = if verbose { "debug" } else { fallback };
    let filter = EnvFilter::try_new(filter_directives(fallback))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))
}
