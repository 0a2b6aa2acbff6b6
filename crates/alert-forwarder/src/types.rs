//! Alert value objects and the Alertmanager webhook payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Value of the `alertname` label carried by the upstream heartbeat alert.
pub const HEARTBEAT_ALERT_NAME: &str = "Watchdog";

/// Label separator used by the Prometheus label signature.
const SEPARATOR_BYTE: u8 = 0xff;
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Alertmanager webhook payload.
///
/// Reference: <https://prometheus.io/docs/alerting/latest/configuration/#webhook_config>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Version of the payload format
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    /// Unique identifier for this group of alerts
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_key: String,
    /// Status of the group: "firing" or "resolved"
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Receiver that matched this notification
    #[serde(default, deserialize_with = "null_as_default")]
    pub receiver: String,
    /// Labels common to all alerts in this group
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_labels: BTreeMap<String, String>,
    /// Labels common to all alerts
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_labels: BTreeMap<String, String>,
    /// Annotations common to all alerts
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_annotations: BTreeMap<String, String>,
    /// External URL for Alertmanager
    #[serde(default, rename = "externalURL", deserialize_with = "null_as_default")]
    pub external_url: String,
    /// Alerts in this notification, in the order Alertmanager sent them
    #[serde(default, deserialize_with = "null_as_default")]
    pub alerts: Vec<Alert>,
}

/// Status of a single alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    Firing,
    Resolved,
}

/// Anything other than `"resolved"`, including an absent or null status,
/// is treated as firing.
impl<'de> Deserialize<'de> for AlertStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let status = Option::<String>::deserialize(deserializer)?;
        Ok(match status.as_deref() {
            Some("resolved") => Self::Resolved,
            _ => Self::Firing,
        })
    }
}

impl AlertStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

/// Individual alert, either decoded from a webhook or synthesized locally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Status: "firing" or "resolved"
    #[serde(default)]
    pub status: AlertStatus,
    /// Alert labels
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
    /// Alert annotations
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: BTreeMap<String, String>,
    /// When the alert started firing, the Unix epoch when not reported
    #[serde(default, deserialize_with = "null_as_default")]
    pub starts_at: DateTime<Utc>,
    /// When the alert was resolved, unset while firing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    /// URL of the expression that generated the alert
    #[serde(default, rename = "generatorURL", deserialize_with = "null_as_default")]
    pub generator_url: String,
    /// Label signature used by downstream consumers for correlation
    #[serde(default, deserialize_with = "null_as_default")]
    pub fingerprint: String,
}

impl Alert {
    /// Get the alert name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.labels.get("alertname").map_or("unknown", String::as_str)
    }

    /// Get the severity.
    #[must_use]
    pub fn severity(&self) -> &str {
        self.labels.get("severity").map_or("none", String::as_str)
    }

    /// Whether this is the upstream pipeline's heartbeat alert.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.labels
            .get("alertname")
            .is_some_and(|name| name == HEARTBEAT_ALERT_NAME)
    }

    /// Build the synthetic alert describing a silent heartbeat.
    #[must_use]
    pub fn watchdog(
        status: AlertStatus,
        starts_at: DateTime<Utc>,
        ends_at: Option<DateTime<Utc>>,
        timeout_secs: u64,
    ) -> Self {
        let labels = BTreeMap::from([
            ("alertname".to_string(), HEARTBEAT_ALERT_NAME.to_string()),
            ("severity".to_string(), "critical".to_string()),
        ]);
        let annotations = BTreeMap::from([(
            "message".to_string(),
            format!(
                "Prometheus AlertManager alerting pipeline is not functional. \
                 Watchdog alert is not firing for longer than {} minutes",
                timeout_secs / 60
            ),
        )]);

        Self {
            status,
            fingerprint: fingerprint(&labels),
            labels,
            annotations,
            starts_at,
            ends_at,
            generator_url: String::new(),
        }
    }
}

/// Decode a field, treating an explicit `null` like an absent one.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Prometheus label signature: FNV-1a over the sorted label pairs.
#[must_use]
pub fn fingerprint(labels: &BTreeMap<String, String>) -> String {
    let mut hash = FNV_OFFSET_BASIS;
    let mut add = |bytes: &[u8]| {
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    };

    for (name, value) in labels {
        add(name.as_bytes());
        add(&[SEPARATOR_BYTE]);
        add(value.as_bytes());
        add(&[SEPARATOR_BYTE]);
    }

    format!("{hash:016x}")
}
