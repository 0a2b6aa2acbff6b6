//! Alert classification and forwarding.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::config::ConfigStore;
use crate::sink::{Delivery, DeliveryQueue, SinkEvent};
use crate::types::Alert;
use crate::watchdog::WatchdogMonitor;

/// What happened to a forwarded alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    /// Handed to the delivery workers
    Queued,
    /// Dropped because the forwarder is silenced
    Silenced,
    /// Dropped because the delivery workers are gone
    Dropped,
}

/// Counts for one inbound batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub heartbeats: usize,
    pub forwarded: usize,
}

/// Routes heartbeats to the watchdog and everything else to the sink.
pub struct AlertDispatcher {
    config: Arc<ConfigStore>,
    watchdog: Arc<WatchdogMonitor>,
    clock: Arc<dyn Clock>,
    queue: DeliveryQueue,
}

impl AlertDispatcher {
    pub fn new(
        config: Arc<ConfigStore>,
        watchdog: Arc<WatchdogMonitor>,
        clock: Arc<dyn Clock>,
        queue: DeliveryQueue,
    ) -> Self {
        Self {
            config,
            watchdog,
            clock,
            queue,
        }
    }

    /// Process a decoded webhook batch in order. Delivery outcomes never
    /// affect the result.
    pub async fn handle_batch(&self, alerts: Vec<Alert>) -> BatchSummary {
        let mut summary = BatchSummary {
            received: alerts.len(),
            ..BatchSummary::default()
        };

        for alert in alerts {
            if alert.is_heartbeat() {
                summary.heartbeats += 1;
                let settings = self.config.snapshot().watchdog;
                let resolved = self.watchdog.record_heartbeat(&settings);
                info!("Processed Watchdog heartbeat");
                if let Some(resolved) = resolved {
                    self.forward(resolved).await;
                }
            } else if self.forward(alert).await == Forwarded::Queued {
                summary.forwarded += 1;
            }
        }

        summary
    }

    /// Run one liveness check and forward any synthetic outage alert.
    pub async fn check_liveness(&self) -> Option<Forwarded> {
        let settings = self.config.snapshot().watchdog;
        let alert = self.watchdog.check_liveness(&settings)?;
        Some(self.forward(alert).await)
    }

    /// Check liveness every `watchdog.check_interval`, re-reading the
    /// interval from the current snapshot each cycle.
    pub async fn run_liveness_checks(self: Arc<Self>) {
        loop {
            let interval = self.config.snapshot().watchdog.check_interval();
            tokio::time::sleep(interval).await;
            self.check_liveness().await;
        }
    }

    /// Send one alert to the sink unless silenced.
    pub async fn forward(&self, alert: Alert) -> Forwarded {
        let config = self.config.snapshot();

        if config.silenced {
            info!(
                alert = alert.name(),
                severity = alert.severity(),
                "Alert silenced"
            );
            return Forwarded::Silenced;
        }

        let name = alert.name().to_string();
        let severity = alert.severity().to_string();
        let delivery = Delivery {
            collector: config.collector.clone(),
            event: SinkEvent::new(alert, &config.event, self.clock.now()),
        };

        match self.queue.enqueue(delivery).await {
            Ok(()) => {
                debug!(alert = %name, severity = %severity, "Alert queued for delivery");
                Forwarded::Queued
            }
            Err(e) => {
                error!(alert = %name, severity = %severity, error = %e, "Failed to queue alert");
                Forwarded::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::tests::FULL;
    use crate::config::Configuration;
    use crate::sink::pool::tests::RecordingSink;
    use crate::sink::{DeliveryPool, Sink};
    use crate::types::AlertStatus;
    use crate::watchdog::Phase;
    use chrono::{DateTime, TimeDelta, Utc};
    use std::collections::BTreeMap;

    struct Harness {
        clock: Arc<ManualClock>,
        sink: Arc<RecordingSink>,
        watchdog: Arc<WatchdogMonitor>,
        dispatcher: AlertDispatcher,
        pool: DeliveryPool,
        start: DateTime<Utc>,
    }

    impl Harness {
        fn new(document: &str) -> Self {
            let start = Utc::now();
            let clock = Arc::new(ManualClock::new(start));
            let config = Arc::new(ConfigStore::new(
                Configuration::parse(document, start).unwrap(),
            ));
            let watchdog = Arc::new(WatchdogMonitor::new(
                Arc::clone(&clock) as Arc<dyn Clock>,
                &config.snapshot().watchdog,
            ));
            let sink = Arc::new(RecordingSink::default());
            let (queue, pool) = DeliveryPool::spawn(Arc::clone(&sink) as Arc<dyn Sink>, 2, 16);
            let dispatcher = AlertDispatcher::new(
                config,
                Arc::clone(&watchdog),
                Arc::clone(&clock) as Arc<dyn Clock>,
                queue,
            );

            Self {
                clock,
                sink,
                watchdog,
                dispatcher,
                pool,
                start,
            }
        }

        /// Drop the dispatcher and wait for every queued delivery.
        async fn finish(self) -> (Arc<RecordingSink>, Arc<WatchdogMonitor>) {
            drop(self.dispatcher);
            self.pool.join().await;
            (self.sink, self.watchdog)
        }
    }

    fn alert(name: &str) -> Alert {
        Alert {
            status: AlertStatus::Firing,
            labels: BTreeMap::from([
                ("alertname".to_string(), name.to_string()),
                ("severity".to_string(), "warning".to_string()),
            ]),
            annotations: BTreeMap::new(),
            starts_at: Utc::now(),
            ends_at: None,
            generator_url: String::new(),
            fingerprint: String::new(),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_is_not_forwarded() {
        let harness = Harness::new(FULL);
        let summary = harness
            .dispatcher
            .handle_batch(vec![alert("HighCPU"), alert("Watchdog"), alert("DiskFull")])
            .await;
        assert_eq!(
            summary,
            BatchSummary {
                received: 3,
                heartbeats: 1,
                forwarded: 2
            }
        );

        let (sink, _) = harness.finish().await;
        let mut names: Vec<String> = sink
            .delivered()
            .iter()
            .map(|e| e.event.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["DiskFull", "HighCPU"]);
        assert!(sink.delivered().iter().all(|e| e.host == "prod-cluster"));
    }

    #[tokio::test]
    async fn test_silenced_drops_everything() {
        let harness = Harness::new(&FULL.replace("silenced: false", "silenced: true"));
        let summary = harness
            .dispatcher
            .handle_batch(vec![alert("HighCPU"), alert("DiskFull")])
            .await;
        assert_eq!(summary.forwarded, 0);

        harness.clock.advance(TimeDelta::seconds(61));
        assert_eq!(
            harness.dispatcher.check_liveness().await,
            Some(Forwarded::Silenced)
        );

        let (sink, _) = harness.finish().await;
        assert_eq!(sink.delivered().len(), 0);
    }

    #[tokio::test]
    async fn test_alert_without_name_is_forwarded() {
        let harness = Harness::new(FULL);
        let mut unnamed = alert("x");
        unnamed.labels.remove("alertname");
        let summary = harness.dispatcher.handle_batch(vec![unnamed]).await;
        assert_eq!(summary.forwarded, 1);

        let (sink, _) = harness.finish().await;
        assert_eq!(sink.delivered()[0].event.name(), "unknown");
    }

    #[tokio::test]
    async fn test_outage_and_recovery_are_forwarded() {
        let harness = Harness::new(FULL);
        let start = harness.start;

        harness.clock.advance(TimeDelta::seconds(61));
        assert_eq!(
            harness.dispatcher.check_liveness().await,
            Some(Forwarded::Queued)
        );
        harness.clock.advance(TimeDelta::seconds(10));
        assert_eq!(harness.dispatcher.check_liveness().await, None);

        harness.clock.advance(TimeDelta::seconds(9));
        let summary = harness
            .dispatcher
            .handle_batch(vec![alert("Watchdog")])
            .await;
        assert_eq!(summary.heartbeats, 1);
        assert_eq!(summary.forwarded, 0);

        let (sink, watchdog) = harness.finish().await;
        assert_eq!(watchdog.status().phase, Phase::Healthy);

        let mut events = sink.delivered();
        events.sort_by_key(|e| e.event.status.as_str());
        assert_eq!(events.len(), 2);

        let firing = &events[0].event;
        assert_eq!(firing.status, AlertStatus::Firing);
        assert_eq!(firing.starts_at, start + TimeDelta::seconds(61));

        let resolved = &events[1].event;
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.starts_at, start + TimeDelta::seconds(61));
        assert_eq!(resolved.ends_at, Some(start + TimeDelta::seconds(80)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_loop_uses_check_interval() {
        let harness = Harness::new(FULL);
        harness.clock.advance(TimeDelta::seconds(61));

        let dispatcher = Arc::new(harness.dispatcher);
        let task = tokio::spawn(Arc::clone(&dispatcher).run_liveness_checks());
        tokio::time::sleep(std::time::Duration::from_secs(31)).await;
        task.abort();
        let _ = task.await;
        drop(dispatcher);
        harness.pool.join().await;

        assert_eq!(harness.watchdog.status().phase, Phase::Outage);
        assert_eq!(harness.sink.delivered().len(), 1);
    }
}
