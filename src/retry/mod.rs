//! Durable dead-letter storage and retry scheduling

mod scheduler;
mod store;

pub use scheduler::{RetryConfig, RetryScheduler};
pub use store::{DeadLetterStats, DeadLetterStore};
