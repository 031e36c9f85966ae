//! Beacon - multi-tenant real-time location ingestion gateway
//!
//! Authenticated users open time-bounded tracking sessions and stream
//! geographic fixes. Each fix is validated against its session under strict
//! tenant isolation, persisted, and fanned out to a message bus for
//! asynchronous delivery to an external analytics sink. Failed deliveries
//! land in a durable dead-letter store drained by a prioritized,
//! session-gated retry scheduler with exponential backoff.
//!
//! ## Subsystems
//!
//! - **Server**: HTTP surface for sessions, fixes, auth, and operations
//! - **Cache**: in-process TTL caches for sessions and bearer tokens
//! - **Producer**: bounded non-blocking fan-out onto the bus
//! - **Consumer**: durable bus consumer driving external delivery
//! - **Retry**: dead-letter storage and the periodic retry sweep

pub mod auth;
pub mod bus;
pub mod cache;
pub mod config;
pub mod db;
pub mod delivery;
pub mod events;
pub mod producer;
pub mod retry;
pub mod routes;
pub mod server;
pub mod sessions;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{BeaconError, Result};
