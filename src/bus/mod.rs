//! Message bus integration
//!
//! NATS JetStream carries location events between the ingest path and the
//! delivery consumer. One subject per tenant keeps each tenant's fixes
//! ordered; the durable pull consumer gives at-least-once delivery with
//! explicit acks.

pub mod client;
pub mod consumer;

pub use client::{BusClient, LOCATION_STREAM};
pub use consumer::LocationConsumer;
