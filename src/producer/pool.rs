//! Bounded producer pool for bus fan-out
//!
//! A fixed-capacity queue feeds a fixed set of worker tasks that publish
//! events to the bus. Enqueueing never blocks the ingest handler: when the
//! queue is full the event is dropped and counted. Durability past the bus
//! entry point belongs to the dead-letter path, so a failed publish after
//! dequeue is logged and counted but not re-queued.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::bus::client::{event_headers, BusClient};
use crate::events::LocationEvent;
use crate::types::{BeaconError, Result};

/// Per-message publish timeout
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the producer pool
pub struct ProducerConfig {
    /// Number of worker tasks
    pub worker_count: usize,
    /// Maximum queued events; events beyond this are dropped
    pub queue_size: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            queue_size: 1000,
        }
    }
}

/// Snapshot of producer metrics for reporting
#[derive(Debug, Clone, Serialize)]
pub struct ProducerMetrics {
    pub events_queued: u64,
    pub events_dropped: u64,
    pub events_sent: u64,
    pub send_errors: u64,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub worker_count: usize,
}

struct Shared {
    events_queued: AtomicU64,
    events_dropped: AtomicU64,
    events_sent: AtomicU64,
    send_errors: AtomicU64,
}

/// Bounded, non-blocking event producer
pub struct EventProducer {
    event_tx: mpsc::Sender<LocationEvent>,
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    queue_size: usize,
    worker_count: usize,
}

impl EventProducer {
    /// Create and start the producer pool
    pub fn new(bus: BusClient, config: ProducerConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<LocationEvent>(config.queue_size);
        let event_rx = Arc::new(Mutex::new(event_rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            events_queued: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            events_sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
        });

        let mut workers = Vec::with_capacity(config.worker_count);
        for i in 0..config.worker_count {
            let bus = bus.clone();
            let event_rx = Arc::clone(&event_rx);
            let shared = Arc::clone(&shared);
            let shutdown_rx = shutdown_rx.clone();

            workers.push(tokio::spawn(async move {
                worker_task(i, bus, event_rx, shared, shutdown_rx).await;
            }));
        }

        info!(
            "Producer pool started with {} workers, queue capacity {}",
            config.worker_count, config.queue_size
        );

        Self {
            event_tx,
            shared,
            shutdown_tx,
            workers: Mutex::new(workers),
            queue_size: config.queue_size,
            worker_count: config.worker_count,
        }
    }

    /// Queue an event for publication. Never blocks: a full queue drops the
    /// event, increments the drop counter, and returns a bus error the
    /// caller records as a metric.
    pub fn try_send(&self, event: LocationEvent) -> Result<()> {
        match self.event_tx.try_send(event) {
            Ok(()) => {
                self.shared.events_queued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_) => {
                self.shared.events_dropped.fetch_add(1, Ordering::Relaxed);
                Err(BeaconError::Bus("event queue full, event dropped".into()))
            }
        }
    }

    /// Snapshot of producer metrics
    pub fn metrics(&self) -> ProducerMetrics {
        ProducerMetrics {
            events_queued: self.shared.events_queued.load(Ordering::Relaxed),
            events_dropped: self.shared.events_dropped.load(Ordering::Relaxed),
            events_sent: self.shared.events_sent.load(Ordering::Relaxed),
            send_errors: self.shared.send_errors.load(Ordering::Relaxed),
            queue_depth: self.queue_size - self.event_tx.capacity(),
            queue_capacity: self.queue_size,
            worker_count: self.worker_count,
        }
    }

    /// Signal workers to drain in-flight events and exit, then wait for them
    pub async fn shutdown(&self) {
        info!("Producer pool shutting down...");
        let _ = self.shutdown_tx.send(true);

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
        info!("Producer pool shutdown complete");
    }
}

/// Worker task: receive events and publish them to the bus
async fn worker_task(
    worker_id: usize,
    bus: BusClient,
    event_rx: Arc<Mutex<mpsc::Receiver<LocationEvent>>>,
    shared: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let event = {
            let mut rx = event_rx.lock().await;
            tokio::select! {
                event = rx.recv() => match event {
                    Some(e) => e,
                    None => {
                        debug!("Producer worker {} exiting (channel closed)", worker_id);
                        return;
                    }
                },
                _ = shutdown_rx.changed() => {
                    // Drain whatever is already queued, then exit
                    while let Ok(event) = rx.try_recv() {
                        publish(worker_id, &bus, &shared, event).await;
                    }
                    debug!("Producer worker {} exiting (shutdown)", worker_id);
                    return;
                }
            }
        };

        publish(worker_id, &bus, &shared, event).await;
    }
}

async fn publish(worker_id: usize, bus: &BusClient, shared: &Shared, event: LocationEvent) {
    let payload = match serde_json::to_vec(&event) {
        Ok(p) => p,
        Err(e) => {
            error!("Producer worker {} failed to serialize event: {}", worker_id, e);
            shared.send_errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let subject = event.subject();
    let headers = event_headers(
        &event.event_type,
        &event.tenant_id.to_string(),
        &event.user_id,
    );

    let result = tokio::time::timeout(
        SEND_TIMEOUT,
        bus.publish_with_headers(subject, headers, payload.into()),
    )
    .await;

    match result {
        Ok(Ok(())) => {
            shared.events_sent.fetch_add(1, Ordering::Relaxed);
            debug!(
                event_id = %event.id,
                worker = worker_id,
                "Location event published"
            );
        }
        Ok(Err(e)) => {
            shared.send_errors.fetch_add(1, Ordering::Relaxed);
            error!("Producer worker {} publish failed: {}", worker_id, e);
        }
        Err(_) => {
            shared.send_errors.fetch_add(1, Ordering::Relaxed);
            error!("Producer worker {} publish timed out", worker_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProducerConfig::default();
        assert_eq!(config.worker_count, 10);
        assert_eq!(config.queue_size, 1000);
    }

    // Drop semantics are exercised against the channel alone: a full
    // bounded queue rejects without blocking.
    #[tokio::test]
    async fn test_try_send_drops_when_full() {
        let (tx, _rx) = mpsc::channel::<u32>(2);
        assert!(tx.try_send(1).is_ok());
        assert!(tx.try_send(2).is_ok());
        assert!(tx.try_send(3).is_err());
    }
}
