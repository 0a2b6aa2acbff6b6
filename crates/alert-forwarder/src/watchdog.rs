//! Heartbeat liveness tracking.
//!
//! The upstream pipeline continuously fires a `Watchdog` alert. As long as it
//! keeps arriving the monitor stays [`Phase::Healthy`]. Once the heartbeat has
//! been silent for longer than `watchdog.timeout` the monitor declares an
//! outage and emits a synthetic firing alert, repeated at most once per
//! `watchdog.alert_interval`. The next heartbeat ends the outage with a
//! synthetic resolved alert.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::WatchdogSettings;
use crate::types::{Alert, AlertStatus};

/// Health of the upstream pipeline as seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Heartbeats are arriving
    Healthy,
    /// An outage was declared and has not been resolved yet
    Outage,
}

/// Copy of the monitor's mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogState {
    pub last_heartbeat_at: DateTime<Utc>,
    pub last_synthetic_alert_at: DateTime<Utc>,
    pub phase: Phase,
}

/// Liveness state machine for the upstream heartbeat.
pub struct WatchdogMonitor {
    state: Mutex<WatchdogState>,
    clock: Arc<dyn Clock>,
}

impl WatchdogMonitor {
    /// Start healthy, and already eligible to alert once the timeout passes.
    pub fn new(clock: Arc<dyn Clock>, settings: &WatchdogSettings) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(WatchdogState {
                last_heartbeat_at: now,
                last_synthetic_alert_at: now - settings.alert_interval(),
                phase: Phase::Healthy,
            }),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WatchdogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn status(&self) -> WatchdogState {
        *self.lock()
    }

    /// Note a heartbeat. Returns the resolved alert that closes an ongoing
    /// outage, if there was one.
    pub fn record_heartbeat(&self, settings: &WatchdogSettings) -> Option<Alert> {
        let now = self.clock.now();
        let (previous_phase, outage_started_at) = {
            let mut state = self.lock();
            let previous = (state.phase, state.last_synthetic_alert_at);
            state.last_heartbeat_at = now;
            state.last_synthetic_alert_at = now - settings.alert_interval();
            state.phase = Phase::Healthy;
            previous
        };

        match previous_phase {
            Phase::Healthy => {
                debug!("Watchdog heartbeat received");
                None
            }
            Phase::Outage => {
                info!(
                    outage_started_at = %outage_started_at,
                    "Watchdog heartbeat is back, resolving outage"
                );
                Some(Alert::watchdog(
                    AlertStatus::Resolved,
                    outage_started_at,
                    Some(now),
                    settings.timeout_secs,
                ))
            }
        }
    }

    /// Declare or re-declare an outage when the heartbeat is stale and the
    /// re-alert cooldown has elapsed.
    pub fn check_liveness(&self, settings: &WatchdogSettings) -> Option<Alert> {
        let now = self.clock.now();
        let last_heartbeat_at = {
            let mut state = self.lock();
            let stale = now > state.last_heartbeat_at + settings.timeout();
            let cooled_down = now > state.last_synthetic_alert_at + settings.alert_interval();
            if !(stale && cooled_down) {
                return None;
            }
            state.phase = Phase::Outage;
            state.last_synthetic_alert_at = now;
            state.last_heartbeat_at
        };

        warn!(
            last_heartbeat_at = %last_heartbeat_at,
            timeout_secs = settings.timeout_secs,
            "Watchdog heartbeat missing, alerting pipeline considered down"
        );
        Some(Alert::watchdog(
            AlertStatus::Firing,
            now,
            None,
            settings.timeout_secs,
        ))
    }
}
