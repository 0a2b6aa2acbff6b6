//! Forwarder configuration.
//!
//! The configuration document is a YAML file with flat dotted keys, e.g.
//!
//! ```yaml
//! silenced: false
//! log.level: info
//! event.host: prod-cluster
//! event.sourceType: prometheus:alert
//! watchdog.check_interval: 30
//! watchdog.alert_interval: 3600
//! watchdog.timeout: 600
//! collector.host: splunk.example.com
//! collector.protocol: https
//! collector.port: 8088
//! collector.token: 00000000-0000-0000-0000-000000000000
//! ```
//!
//! A document is parsed into a [`Configuration`] only if every required
//! field is present. Installed snapshots live in a [`ConfigStore`] and are
//! replaced wholesale by the [`ConfigReloader`].

pub mod source;
pub mod store;

pub use source::{ConfigSource, FileSource};
pub use store::{ConfigReloader, ConfigStore, ReloadOutcome};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

use crate::error::ConfigError;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/alert-forwarder-config.yaml";

/// Collector port used when `collector.port` is omitted.
pub const DEFAULT_COLLECTOR_PORT: u16 = 8088;

/// Largest accepted watchdog interval, about 68 years.
pub const MAX_INTERVAL_SECS: u64 = i32::MAX as u64;

/// Validated, immutable configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// When set, alerts are classified and logged but never delivered
    pub silenced: bool,
    /// Process log level
    pub log_level: LogLevel,
    /// Metadata attached to every outbound event
    pub event: EventSettings,
    /// Heartbeat monitoring thresholds
    pub watchdog: WatchdogSettings,
    /// Event collector connection
    pub collector: CollectorSettings,
    /// Modification marker of the source this snapshot was loaded from
    pub version: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSettings {
    pub host: String,
    pub source_type: String,
}

/// Watchdog thresholds, all in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogSettings {
    /// How often liveness is checked
    pub check_interval_secs: u64,
    /// Minimum spacing between synthetic firing alerts
    pub alert_interval_secs: u64,
    /// Heartbeat silence tolerated before an outage is declared
    pub timeout_secs: u64,
}

impl WatchdogSettings {
    #[must_use]
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub fn alert_interval(&self) -> TimeDelta {
        TimeDelta::seconds(self.alert_interval_secs as i64)
    }

    #[must_use]
    pub fn timeout(&self) -> TimeDelta {
        TimeDelta::seconds(self.timeout_secs as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSettings {
    pub host: String,
    pub protocol: CollectorProtocol,
    pub port: u16,
    pub token: String,
    /// Skip TLS certificate verification toward the collector
    pub insecure_skip_verify: bool,
}

impl CollectorSettings {
    /// Base URL of the collector, e.g. `https://splunk:8088`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectorProtocol {
    Http,
    #[default]
    Https,
}

impl fmt::Display for CollectorProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

impl FromStr for CollectorProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(ConfigError::InvalidProtocol(other.to_string())),
        }
    }
}

/// Log verbosity accepted by `log.level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn as_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            // tracing has nothing above error
            "error" | "fatal" | "panic" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

/// Document as written on disk, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    silenced: bool,
    #[serde(default, rename = "log.level", alias = "logLevel")]
    log_level: Option<String>,
    #[serde(default, rename = "event.host")]
    event_host: Option<String>,
    #[serde(default, rename = "event.sourceType")]
    event_source_type: Option<String>,
    #[serde(default, rename = "watchdog.check_interval")]
    watchdog_check_interval: Option<u64>,
    #[serde(default, rename = "watchdog.alert_interval")]
    watchdog_alert_interval: Option<u64>,
    #[serde(default, rename = "watchdog.timeout")]
    watchdog_timeout: Option<u64>,
    #[serde(default, rename = "collector.host")]
    collector_host: Option<String>,
    #[serde(default, rename = "collector.protocol")]
    collector_protocol: Option<String>,
    #[serde(default, rename = "collector.port")]
    collector_port: Option<u16>,
    #[serde(default, rename = "collector.token")]
    collector_token: Option<String>,
    #[serde(default, rename = "collector.insecure_skip_verify")]
    collector_insecure_skip_verify: Option<bool>,
}

fn required_secs(value: Option<u64>, key: &'static str) -> Result<u64, ConfigError> {
    let secs = value.filter(|v| *v > 0).ok_or(ConfigError::Missing(key))?;
    if secs > MAX_INTERVAL_SECS {
        return Err(ConfigError::OutOfRange {
            key,
            max: MAX_INTERVAL_SECS,
        });
    }
    Ok(secs)
}

fn required_str(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

impl Configuration {
    /// Parse and validate a configuration document.
    pub fn parse(text: &str, version: DateTime<Utc>) -> Result<Self, ConfigError> {
        let raw: RawConfig = if text.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(text)?
        };
        Self::validate(raw, version)
    }

    /// Read, parse and validate the document behind `source`.
    pub fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let version = source.modified()?;
        let text = source.read()?;
        Self::parse(&text, version)
    }

    fn validate(raw: RawConfig, version: DateTime<Utc>) -> Result<Self, ConfigError> {
        let log_level = match raw.log_level.as_deref() {
            None | Some("") => LogLevel::default(),
            Some(level) => level.parse()?,
        };

        let watchdog = WatchdogSettings {
            check_interval_secs: required_secs(
                raw.watchdog_check_interval,
                "watchdog.check_interval",
            )?,
            alert_interval_secs: required_secs(
                raw.watchdog_alert_interval,
                "watchdog.alert_interval",
            )?,
            timeout_secs: required_secs(raw.watchdog_timeout, "watchdog.timeout")?,
        };

        let event = EventSettings {
            host: required_str(raw.event_host, "event.host")?,
            source_type: required_str(raw.event_source_type, "event.sourceType")?,
        };

        let host = required_str(raw.collector_host, "collector.host")?;
        let token = required_str(raw.collector_token, "collector.token")?;
        let protocol = match raw.collector_protocol.as_deref() {
            None | Some("") => CollectorProtocol::default(),
            Some(protocol) => protocol.parse()?,
        };
        let port = match raw.collector_port {
            None | Some(0) => DEFAULT_COLLECTOR_PORT,
            Some(port) => port,
        };

        Ok(Self {
            silenced: raw.silenced,
            log_level,
            event,
            watchdog,
            collector: CollectorSettings {
                host,
                protocol,
                port,
                token,
                insecure_skip_verify: raw.collector_insecure_skip_verify.unwrap_or(true),
            },
            version,
        })
    }
}
