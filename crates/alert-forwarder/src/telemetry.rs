//! Logging setup.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::config::LogLevel;

/// Handle for changing the process log level after startup.
#[derive(Clone)]
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelHandle {
    /// Replace the active filter with the given level.
    pub fn apply(&self, level: LogLevel) {
        let directive: Directive = level.as_filter().into();
        if let Err(e) = self
            .handle
            .modify(|filter| *filter = EnvFilter::default().add_directive(directive))
        {
            tracing::warn!(error = %e, "Failed to update log level");
        }
    }
}

/// Install the global subscriber. `RUST_LOG` is honoured until the first
/// configuration is applied.
pub fn init(json: bool) -> LogLevelHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    LogLevelHandle { handle }
}
