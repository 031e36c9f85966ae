//! Producer worker pool
//!
//! Non-blocking fan-out of location events onto the message bus.

mod pool;

pub use pool::{EventProducer, ProducerConfig, ProducerMetrics};
