//! Current configuration snapshot and its hot-reload loop.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{ConfigSource, Configuration};
use crate::error::ConfigError;
use crate::telemetry::LogLevelHandle;

/// How often the source is polled when no interval is given.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(15);

/// Holds the installed configuration. Readers never block and never see a
/// partially updated snapshot.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<Configuration>,
}

/// Result of a single reload attempt.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// Source marker is not newer than the installed snapshot
    Unchanged,
    /// A new snapshot was installed
    Reloaded(Arc<Configuration>),
    /// The source changed but could not be loaded; the old snapshot stays
    Rejected(ConfigError),
}

impl ConfigStore {
    #[must_use]
    pub fn new(initial: Configuration) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Latest installed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Configuration> {
        self.current.load_full()
    }

    /// Replace the installed snapshot.
    pub fn install(&self, config: Configuration) -> Arc<Configuration> {
        let config = Arc::new(config);
        self.current.store(Arc::clone(&config));
        config
    }

    /// Load `source` again if its marker moved past the installed version.
    pub fn reload_if_changed(&self, source: &dyn ConfigSource) -> ReloadOutcome {
        let marker = match source.modified() {
            Ok(marker) => marker,
            Err(e) => return ReloadOutcome::Rejected(e),
        };

        if marker <= self.current.load().version {
            return ReloadOutcome::Unchanged;
        }

        let loaded = source
            .read()
            .and_then(|text| Configuration::parse(&text, marker));
        match loaded {
            Ok(config) => ReloadOutcome::Reloaded(self.install(config)),
            Err(e) => ReloadOutcome::Rejected(e),
        }
    }
}

/// Periodically polls a [`ConfigSource`] and swaps in changed snapshots.
pub struct ConfigReloader {
    store: Arc<ConfigStore>,
    source: Arc<dyn ConfigSource>,
    interval: Duration,
    log_level: Option<LogLevelHandle>,
}

impl ConfigReloader {
    #[must_use]
    pub fn new(store: Arc<ConfigStore>, source: Arc<dyn ConfigSource>, interval: Duration) -> Self {
        Self {
            store,
            source,
            interval,
            log_level: None,
        }
    }

    /// Apply the log level of every newly installed snapshot.
    #[must_use]
    pub fn with_log_level(mut self, handle: LogLevelHandle) -> Self {
        self.log_level = Some(handle);
        self
    }

    /// Run one reload cycle and log the outcome.
    pub fn reload_once(&self) -> ReloadOutcome {
        let outcome = self.store.reload_if_changed(self.source.as_ref());
        match &outcome {
            ReloadOutcome::Unchanged => debug!("Configuration unchanged"),
            ReloadOutcome::Reloaded(config) => {
                if let Some(handle) = &self.log_level {
                    handle.apply(config.log_level);
                }
                info!(
                    version = %config.version,
                    silenced = config.silenced,
                    log_level = config.log_level.as_str(),
                    "Reloaded configuration"
                );
            }
            ReloadOutcome::Rejected(e) => {
                error!(error = %e, "Failed to reload configuration, keeping previous snapshot");
            }
        }
        outcome
    }

    /// Poll forever.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately and the snapshot is fresh.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.reload_once();
        }
    }
}
