//! Storage layer
//!
//! MongoDB client, document schemas, and the tenant-scoped access wrapper
//! that enforces row-level isolation.

pub mod mongo;
pub mod schemas;
pub mod tenant;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use tenant::{TenantOwned, TenantScoped};
