//! External analytics sink client
//!
//! POSTs location events to the third-party endpoint. Any 2xx is success;
//! non-2xx and transport failures are reported as `DeliveryError` and the
//! caller decides whether to dead-letter. The sink is idempotent on event
//! id, so redelivery is safe.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use serde::Serialize;
use tracing::debug;

use crate::events::{DeliveryEnvelope, LocationEvent};

/// External POST timeout
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// A failed delivery attempt
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("third-party returned status {0}")]
    Status(u16),

    #[error("failed to send location update: {0}")]
    Transport(String),
}

/// Snapshot of delivery health for the status surface
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryStatus {
    pub connected: bool,
    pub endpoint: String,
    pub total_sent: u64,
    pub total_failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Client for the third-party analytics endpoint
pub struct ThirdPartyClient {
    endpoint: String,
    http: reqwest::Client,
    connected: AtomicBool,
    total_sent: AtomicU64,
    total_failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ThirdPartyClient {
    pub fn new(endpoint: &str) -> crate::types::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| crate::types::BeaconError::Config(format!("delivery client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
            connected: AtomicBool::new(false),
            total_sent: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            last_error: Mutex::new(None),
        })
    }

    /// POST one location event to the sink
    pub async fn send_location_update(
        &self,
        event: &LocationEvent,
    ) -> Result<(), DeliveryError> {
        let envelope = DeliveryEnvelope::new(event.clone());
        let url = format!("{}/location", self.endpoint);

        let response = self
            .http
            .post(&url)
            .header("X-Tenant-ID", event.tenant_id.to_string())
            .header("X-User-ID", &event.user_id)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| {
                let err = DeliveryError::Transport(e.to_string());
                self.record_failure(&err);
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = DeliveryError::Status(status.as_u16());
            self.record_failure(&err);
            return Err(err);
        }

        self.record_success();
        debug!(event_id = %event.id, "Location event delivered");
        Ok(())
    }

    fn record_success(&self) {
        self.connected.store(true, Ordering::Relaxed);
        self.total_sent.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap() = None;
    }

    fn record_failure(&self, err: &DeliveryError) {
        self.connected.store(false, Ordering::Relaxed);
        self.total_failed.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap() = Some(err.to_string());
    }

    /// Snapshot for the status surface
    pub fn status(&self) -> DeliveryStatus {
        DeliveryStatus {
            connected: self.connected.load(Ordering::Relaxed),
            endpoint: self.endpoint.clone(),
            total_sent: self.total_sent.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            last_error: self.last_error.lock().unwrap().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = ThirdPartyClient::new("http://sink.example.com/").unwrap();
        assert_eq!(client.status().endpoint, "http://sink.example.com");
    }

    #[test]
    fn test_error_messages_carry_status() {
        let err = DeliveryError::Status(502);
        assert_eq!(err.to_string(), "third-party returned status 502");
    }

    #[tokio::test]
    async fn test_unreachable_sink_is_transport_error() {
        // Port 1 is never listening
        let client = ThirdPartyClient::new("http://127.0.0.1:1").unwrap();
        let event = LocationEvent {
            id: uuid::Uuid::new_v4(),
            tenant_id: uuid::Uuid::new_v4(),
            user_id: "s".into(),
            session_id: uuid::Uuid::new_v4(),
            latitude: 0.0,
            longitude: 0.0,
            timestamp: chrono::Utc::now(),
            event_type: crate::events::LOCATION_EVENT_TYPE.into(),
        };

        let result = client.send_location_update(&event).await;
        assert!(matches!(result, Err(DeliveryError::Transport(_))));

        let status = client.status();
        assert!(!status.connected);
        assert_eq!(status.total_failed, 1);
        assert!(status.last_error.is_some());
    }
}
