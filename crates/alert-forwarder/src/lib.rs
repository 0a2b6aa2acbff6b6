//! Alertmanager to event collector bridge.
//!
//! Receives Alertmanager webhook notifications and forwards every alert as an
//! event to a Splunk HTTP Event Collector. The `Watchdog` heartbeat alert is
//! not forwarded; instead it feeds a [`WatchdogMonitor`] that raises a
//! synthetic alert when the heartbeat stops arriving and resolves it when the
//! heartbeat comes back.
//!
//! # Architecture
//!
//! - [`ConfigStore`] holds the current [`Configuration`] snapshot and is
//!   refreshed by a polling [`ConfigReloader`]
//! - [`WatchdogMonitor`] tracks heartbeat liveness against an injected [`Clock`]
//! - [`AlertDispatcher`] classifies alerts and queues deliveries
//! - [`DeliveryPool`] drains the bounded queue into a [`Sink`]
//! - [`ServiceContext`] owns all of the above and spawns the periodic tasks

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;
pub mod service;
pub mod sink;
pub mod telemetry;
pub mod types;
pub mod watchdog;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigReloader, ConfigSource, ConfigStore, Configuration, FileSource};
pub use dispatch::{AlertDispatcher, BatchSummary, Forwarded};
pub use error::{ConfigError, SinkError};
pub use service::{ServiceContext, ServiceOptions};
pub use sink::{DeliveryPool, DeliveryQueue, HecSink, Sink, SinkEvent};
pub use types::{Alert, AlertStatus, WebhookPayload};
pub use watchdog::{Phase, WatchdogMonitor};
