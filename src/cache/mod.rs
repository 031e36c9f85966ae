//! In-process caches
//!
//! - `TtlStore`: generic TTL key-value store with periodic cleanup
//! - `SessionCache`: active tracking sessions, keyed by session id
//! - `TokenSessionStore`: bearer token sessions, keyed by token hash

pub mod session;
pub mod store;
pub mod token_session;

pub use session::SessionCache;
pub use store::{spawn_cleanup_task, TtlStore};
pub use token_session::{TokenSession, TokenSessionStore, UserProfile};
