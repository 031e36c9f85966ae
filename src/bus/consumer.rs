//! Location update consumer
//!
//! Pulls location events from the bus and POSTs them to the external sink.
//! Delivery failures become dead-letter rows; the consumer itself never
//! blocks on a failing sink and never surfaces errors to clients.

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::client::BusClient;
use crate::delivery::ThirdPartyClient;
use crate::events::{LocationEvent, LOCATION_TOPIC};
use crate::retry::DeadLetterStore;
use crate::types::{BeaconError, Result};

/// Durable consumer name; fixed per deployment so restarts resume the
/// same cursor
pub const CONSUMER_NAME: &str = "beacon-streaming";

/// Bounded wait for each message fetch
const PULL_TIMEOUT: Duration = Duration::from_secs(10);

/// Messages fetched per pull
const PULL_BATCH: usize = 100;

/// Bus consumer driving external delivery
pub struct LocationConsumer {
    bus: BusClient,
    delivery: Arc<ThirdPartyClient>,
    dead_letters: DeadLetterStore,
    running: Arc<RwLock<bool>>,
}

impl LocationConsumer {
    pub fn new(
        bus: BusClient,
        delivery: Arc<ThirdPartyClient>,
        dead_letters: DeadLetterStore,
    ) -> Self {
        Self {
            bus,
            delivery,
            dead_letters,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Run the consume loop until `stop` is called
    pub async fn run(&self) -> Result<()> {
        *self.running.write().await = true;

        let stream = self.bus.ensure_location_stream().await?;
        let consumer = self.ensure_consumer(&stream).await?;

        info!("Location consumer started (durable {})", CONSUMER_NAME);

        while *self.running.read().await {
            match self.process_batch(&consumer).await {
                Ok(count) => {
                    if count > 0 {
                        debug!("Processed {} location events", count);
                    }
                }
                Err(e) => {
                    error!("Error processing batch: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("Location consumer stopped");
        Ok(())
    }

    /// Stop the consumer after the in-flight batch
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    /// Ensure the durable consumer exists
    async fn ensure_consumer(&self, stream: &Stream) -> Result<PullConsumer> {
        let consumer = stream
            .get_or_create_consumer(
                CONSUMER_NAME,
                jetstream::consumer::pull::Config {
                    durable_name: Some(CONSUMER_NAME.to_string()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    filter_subject: format!("{}.>", LOCATION_TOPIC),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BeaconError::Bus(format!("Failed to create consumer: {}", e)))?;

        info!("Using consumer {}", CONSUMER_NAME);
        Ok(consumer)
    }

    /// Pull and process one batch of messages
    async fn process_batch(&self, consumer: &PullConsumer) -> Result<usize> {
        let mut messages = consumer
            .fetch()
            .max_messages(PULL_BATCH)
            .expires(PULL_TIMEOUT)
            .messages()
            .await
            .map_err(|e| BeaconError::Bus(format!("Failed to fetch messages: {}", e)))?;

        let mut count = 0;

        while let Some(msg_result) = messages.next().await {
            match msg_result {
                Ok(msg) => {
                    count += 1;
                    self.process_message(msg).await;
                }
                Err(e) => {
                    warn!("Error receiving message: {}", e);
                }
            }
        }

        Ok(count)
    }

    /// Process a single message: decode, deliver, ack.
    ///
    /// Acking is the commit. A malformed payload is acked so one poison
    /// pill cannot wedge the stream; a failed delivery is acked only after
    /// its dead-letter row is durably stored, otherwise the message is left
    /// for redelivery.
    async fn process_message(&self, msg: jetstream::Message) {
        let event: LocationEvent = match serde_json::from_slice(&msg.payload) {
            Ok(e) => e,
            Err(e) => {
                error!("Failed to decode location event: {}", e);
                if let Err(e) = msg.ack().await {
                    warn!("Failed to ack malformed message: {}", e);
                }
                return;
            }
        };

        debug!(
            event_id = %event.id,
            tenant_id = %event.tenant_id,
            "Consuming location event"
        );

        if let Err(delivery_err) = self.delivery.send_location_update(&event).await {
            warn!(
                event_id = %event.id,
                "Delivery failed, storing dead letter: {}",
                delivery_err
            );
            if let Err(store_err) = self
                .dead_letters
                .record_failure(&event, &delivery_err.to_string())
                .await
            {
                // No durable record of the failure: leave the message
                // un-acked so the bus redelivers it
                error!(
                    event_id = %event.id,
                    "Failed to store dead letter, leaving message for redelivery: {}",
                    store_err
                );
                return;
            }
        }

        if let Err(e) = msg.ack().await {
            warn!("Failed to ack message: {}", e);
        }
    }
}
