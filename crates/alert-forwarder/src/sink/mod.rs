//! Outbound event delivery.
//!
//! - [`Sink`] is the seam to the event collector
//! - [`HecSink`] speaks the Splunk HTTP Event Collector protocol
//! - [`DeliveryQueue`] / [`DeliveryPool`] bound how many deliveries are
//!   queued and in flight

pub mod hec;
pub mod pool;

pub use hec::HecSink;
pub use pool::{Delivery, DeliveryPool, DeliveryQueue};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{CollectorSettings, EventSettings};
use crate::error::SinkError;
use crate::types::Alert;

/// Event collector capability.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver one event to the collector described by `collector`.
    async fn deliver(
        &self,
        collector: &CollectorSettings,
        event: &SinkEvent,
    ) -> Result<(), SinkError>;
}

/// One alert wrapped with collector metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkEvent {
    /// Epoch seconds with millisecond precision
    pub time: String,
    pub host: String,
    #[serde(rename = "sourcetype")]
    pub source_type: String,
    pub event: Alert,
}

impl SinkEvent {
    #[must_use]
    pub fn new(alert: Alert, settings: &EventSettings, now: DateTime<Utc>) -> Self {
        Self {
            time: format!("{}.{:03}", now.timestamp(), now.timestamp_subsec_millis()),
            host: settings.host.clone(),
            source_type: settings.source_type.clone(),
            event: alert,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertStatus;
    use chrono::TimeZone;

    #[test]
    fn test_event_metadata() {
        let now = Utc.timestamp_millis_opt(1_714_557_600_042).unwrap();
        let settings = EventSettings {
            host: "prod".to_string(),
            source_type: "prometheus:alert".to_string(),
        };
        let event = SinkEvent::new(
            Alert::watchdog(AlertStatus::Firing, now, None, 60),
            &settings,
            now,
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["time"], "1714557600.042");
        assert_eq!(json["host"], "prod");
        assert_eq!(json["sourcetype"], "prometheus:alert");
        assert_eq!(json["event"]["labels"]["alertname"], "Watchdog");
    }
}
