//! Database schemas for Beacon
//!
//! MongoDB document structures for sessions, fixes, dead letters, and users.

mod dead_letter;
mod fix;
mod metadata;
mod session;
mod user;

pub use dead_letter::{
    backoff_delay, DeadLetterDoc, DeadLetterStatus, DEAD_LETTER_COLLECTION,
    RETRY_BASE_DELAY_SECS,
};
pub use fix::{coordinates_in_bounds, FixDoc, FIX_COLLECTION, LATITUDE_RANGE, LONGITUDE_RANGE};
pub use metadata::Metadata;
pub use session::{SessionStatus, TrackingSessionDoc, SESSION_COLLECTION};
pub use user::{UserDoc, UserRole, USER_COLLECTION};
