//! Splunk HTTP Event Collector sink.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Sink, SinkEvent};
use crate::config::CollectorSettings;
use crate::error::SinkError;

/// Path of the JSON event endpoint.
const EVENT_PATH: &str = "/services/collector/event";

/// Request timeout for a single delivery.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers events to a Splunk HEC endpoint.
pub struct HecSink {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
    channel: Uuid,
}

impl HecSink {
    pub fn new() -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let insecure_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            insecure_client,
            channel: Uuid::new_v4(),
        })
    }

    fn client_for(&self, collector: &CollectorSettings) -> &reqwest::Client {
        if collector.insecure_skip_verify {
            &self.insecure_client
        } else {
            &self.client
        }
    }
}

#[async_trait]
impl Sink for HecSink {
    fn name(&self) -> &'static str {
        "splunk-hec"
    }

    async fn deliver(
        &self,
        collector: &CollectorSettings,
        event: &SinkEvent,
    ) -> Result<(), SinkError> {
        let url = format!("{}{EVENT_PATH}", collector.endpoint());

        debug!(
            url = %url,
            event = %serde_json::to_string(event).unwrap_or_default(),
            "Sending event"
        );

        let response = self
            .client_for(collector)
            .post(&url)
            .header("Authorization", format!("Splunk {}", collector.token))
            .header("X-Splunk-Request-Channel", self.channel.to_string())
            .json(event)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            warn!(
                status = %status,
                body = %body,
                "Collector request failed"
            );

            Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollectorProtocol, EventSettings};
    use crate::types::{Alert, AlertStatus};
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn collector_for(server: &MockServer) -> CollectorSettings {
        let address = server.address();
        CollectorSettings {
            host: address.ip().to_string(),
            protocol: CollectorProtocol::Http,
            port: address.port(),
            token: "hec-token".to_string(),
            insecure_skip_verify: false,
        }
    }

    fn event() -> SinkEvent {
        let now = Utc::now();
        SinkEvent::new(
            Alert::watchdog(AlertStatus::Firing, now, None, 600),
            &EventSettings {
                host: "prod".to_string(),
                source_type: "prometheus:alert".to_string(),
            },
            now,
        )
    }

    #[tokio::test]
    async fn test_deliver_posts_event_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EVENT_PATH))
            .and(header("Authorization", "Splunk hec-token"))
            .and(body_partial_json(serde_json::json!({
                "host": "prod",
                "sourcetype": "prometheus:alert",
                "event": {"status": "firing", "labels": {"alertname": "Watchdog"}}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "Success", "code": 0})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sink = HecSink::new().unwrap();
        sink.deliver(&collector_for(&server), &event()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_delivery_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EVENT_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("Invalid token"))
            .mount(&server)
            .await;

        let sink = HecSink::new().unwrap();
        let err = sink
            .deliver(&collector_for(&server), &event())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SinkError::Rejected { status: 403, ref body } if body == "Invalid token"
        ));
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_http_error() {
        let collector = CollectorSettings {
            host: "127.0.0.1".to_string(),
            protocol: CollectorProtocol::Http,
            port: 1,
            token: "hec-token".to_string(),
            insecure_skip_verify: true,
        };

        let sink = HecSink::new().unwrap();
        let err = sink.deliver(&collector, &event()).await.unwrap_err();
        assert!(matches!(err, SinkError::Http(_)));
    }
}
