//! Service context owning the forwarder's shared state and background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::clock::Clock;
use crate::config::store::DEFAULT_RELOAD_INTERVAL;
use crate::config::{ConfigReloader, ConfigSource, ConfigStore, Configuration};
use crate::dispatch::AlertDispatcher;
use crate::sink::pool::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use crate::sink::{DeliveryPool, Sink};
use crate::telemetry::LogLevelHandle;
use crate::watchdog::WatchdogMonitor;

/// Tunables that are not part of the configuration document.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub reload_interval: Duration,
    pub delivery_workers: usize,
    pub queue_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            delivery_workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Everything the request handlers and periodic tasks share.
pub struct ServiceContext {
    pub config: Arc<ConfigStore>,
    pub watchdog: Arc<WatchdogMonitor>,
    pub dispatcher: Arc<AlertDispatcher>,
    options: ServiceOptions,
    pool: DeliveryPool,
}

/// Handles of the reload and liveness loops.
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl ServiceContext {
    /// Install the initial configuration and start the delivery workers.
    /// Must be called inside a Tokio runtime.
    pub fn new(
        initial: Configuration,
        sink: Arc<dyn Sink>,
        clock: Arc<dyn Clock>,
        options: ServiceOptions,
    ) -> Self {
        let watchdog = Arc::new(WatchdogMonitor::new(Arc::clone(&clock), &initial.watchdog));
        let config = Arc::new(ConfigStore::new(initial));
        let (queue, pool) =
            DeliveryPool::spawn(sink, options.delivery_workers, options.queue_capacity);
        let dispatcher = Arc::new(AlertDispatcher::new(
            Arc::clone(&config),
            Arc::clone(&watchdog),
            clock,
            queue,
        ));

        info!(
            workers = pool.size(),
            queue_capacity = options.queue_capacity,
            "Delivery pool started"
        );

        Self {
            config,
            watchdog,
            dispatcher,
            options,
            pool,
        }
    }

    /// Start the configuration reload loop and the liveness check loop.
    pub fn spawn_periodic_tasks(
        &self,
        source: Arc<dyn ConfigSource>,
        log_level: Option<LogLevelHandle>,
    ) -> BackgroundTasks {
        let mut reloader =
            ConfigReloader::new(Arc::clone(&self.config), source, self.options.reload_interval);
        if let Some(handle) = log_level {
            reloader = reloader.with_log_level(handle);
        }

        let handles = vec![
            tokio::spawn(reloader.run()),
            tokio::spawn(Arc::clone(&self.dispatcher).run_liveness_checks()),
        ];

        BackgroundTasks { handles }
    }

    /// Stop the periodic tasks and wait for queued deliveries to finish.
    pub async fn shutdown(self, tasks: BackgroundTasks) {
        for handle in &tasks.handles {
            handle.abort();
        }
        for handle in tasks.handles {
            let _ = handle.await;
        }

        let Self {
            dispatcher, pool, ..
        } = self;
        drop(dispatcher);
        info!("Draining delivery queue");
        pool.join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::tests::FULL;
    use crate::error::ConfigError;
    use crate::sink::pool::tests::RecordingSink;
    use crate::watchdog::Phase;
    use chrono::{DateTime, TimeDelta, Utc};

    struct StaticSource {
        marker: DateTime<Utc>,
    }

    impl ConfigSource for StaticSource {
        fn modified(&self) -> Result<DateTime<Utc>, ConfigError> {
            Ok(self.marker)
        }

        fn read(&self) -> Result<String, ConfigError> {
            Ok(FULL.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_declares_outage_and_drains_on_shutdown() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let sink = Arc::new(RecordingSink::default());
        let service = ServiceContext::new(
            Configuration::parse(FULL, start).unwrap(),
            Arc::clone(&sink) as Arc<dyn Sink>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            ServiceOptions::default(),
        );
        let tasks = service.spawn_periodic_tasks(Arc::new(StaticSource { marker: start }), None);

        clock.advance(TimeDelta::seconds(61));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(service.watchdog.status().phase, Phase::Outage);

        service.shutdown(tasks).await;
        assert_eq!(sink.delivered().len(), 1);
    }
}
