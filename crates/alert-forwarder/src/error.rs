//! Error types for configuration loading and event delivery.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or validating the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The source could not be read or probed
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or has mistyped fields
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A required field is absent, empty or zero
    #[error("configuration: {0} is undefined")]
    Missing(&'static str),

    /// An interval is larger than the watchdog can represent
    #[error("configuration: {key} must not exceed {max} seconds")]
    OutOfRange { key: &'static str, max: u64 },

    /// Collector protocol is neither http nor https
    #[error("collector.protocol must be either http or https")]
    InvalidProtocol(String),

    /// Unknown log level name
    #[error("configuration: unknown log.level {0:?}")]
    InvalidLogLevel(String),
}

/// Errors raised while delivering an event to the collector.
#[derive(Debug, Error)]
pub enum SinkError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Collector answered with a non-success status
    #[error("collector returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Delivery workers have shut down
    #[error("delivery queue is closed")]
    QueueClosed,
}
