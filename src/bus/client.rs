//! NATS JetStream client wrapper
//!
//! Connection management with fast initial failure, plus bootstrap of the
//! location-updates stream.

use async_nats::jetstream::{self, stream::Stream};
use async_nats::{ConnectOptions, HeaderMap, HeaderValue};
use bytes::Bytes;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::NatsArgs;
use crate::events::LOCATION_TOPIC;
use crate::types::BeaconError;

/// JetStream stream holding location update events
pub const LOCATION_STREAM: &str = "LOCATION_UPDATES";

/// Keep-alive ping interval
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// How long undelivered events are retained on the stream
const STREAM_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// NATS client wrapper with JetStream support
#[derive(Clone)]
pub struct BusClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    name: String,
}

impl BusClient {
    /// Connect to the bus
    pub async fn new(args: &NatsArgs, name: &str) -> Result<Self, BeaconError> {
        info!("Connecting to NATS at {}", args.nats_url);

        // No retry on initial connect - fail fast if the bus isn't there.
        // Reconnection still applies after a successful initial connection.
        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| BeaconError::Bus(format!("Failed to connect: {}", e)))?;

        let jetstream = jetstream::new(client.clone());

        info!("Connected to NATS at {}", args.nats_url);

        Ok(Self {
            client,
            jetstream,
            name: name.to_string(),
        })
    }

    /// Ensure the location-updates stream exists
    pub async fn ensure_location_stream(&self) -> Result<Stream, BeaconError> {
        let stream = self
            .jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: LOCATION_STREAM.to_string(),
                subjects: vec![format!("{}.>", LOCATION_TOPIC)],
                max_age: STREAM_MAX_AGE,
                storage: jetstream::stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| BeaconError::Bus(format!("Failed to create stream: {}", e)))?;

        info!(
            "Using stream {} with subjects {}.>",
            LOCATION_STREAM, LOCATION_TOPIC
        );
        Ok(stream)
    }

    /// Publish a message with headers and await stream acknowledgement
    pub async fn publish_with_headers(
        &self,
        subject: String,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<(), BeaconError> {
        self.jetstream
            .publish_with_headers(subject, headers, payload)
            .await
            .map_err(|e| BeaconError::Bus(format!("Publish failed: {}", e)))?
            .await
            .map_err(|e| BeaconError::Bus(format!("Publish not acknowledged: {}", e)))?;
        Ok(())
    }

    /// Flush pending messages
    pub async fn flush(&self) -> Result<(), BeaconError> {
        self.client
            .flush()
            .await
            .map_err(|e| BeaconError::Bus(format!("Flush failed: {}", e)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Headers attached to every location event message
pub fn event_headers(event_type: &str, tenant_id: &str, user_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in [
        ("event_type", event_type),
        ("tenant_id", tenant_id),
        ("user_id", user_id),
    ] {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(key, value);
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_headers_populated() {
        let headers = event_headers("location_update", "tenant-1", "subject-1");
        assert_eq!(
            headers.get("event_type").map(|v| v.as_str()),
            Some("location_update")
        );
        assert_eq!(
            headers.get("tenant_id").map(|v| v.as_str()),
            Some("tenant-1")
        );
        assert_eq!(
            headers.get("user_id").map(|v| v.as_str()),
            Some("subject-1")
        );
    }
}
