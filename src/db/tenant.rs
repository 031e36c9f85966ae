//! Tenant-scoped collection access
//!
//! Every durable document carries a tenant id, and no cross-tenant read may
//! be possible regardless of handler bugs. `TenantScoped` is the enforcement
//! point: it binds a collection handle to one tenant and injects the tenant
//! predicate into every query it executes, so a filter that forgets the
//! tenant still cannot see foreign rows. Inserts are rejected outright when
//! the document's tenant differs from the scope.
//!
//! The retry scheduler's status-only session probe is the one deliberate
//! unscoped read in the crate (see `sessions::SessionAuthority::session_status`);
//! it exposes no payload.

use bson::Document;
use mongodb::options::UpdateModifications;
use mongodb::results::UpdateResult;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use super::mongo::{IntoIndexes, MongoCollection, MutMetadata};
use crate::types::{BeaconError, Result};

/// Documents that carry an owning tenant
pub trait TenantOwned {
    fn tenant_id(&self) -> Uuid;
}

impl TenantOwned for crate::db::schemas::TrackingSessionDoc {
    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }
}

impl TenantOwned for crate::db::schemas::FixDoc {
    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }
}

impl TenantOwned for crate::db::schemas::DeadLetterDoc {
    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }
}

/// A collection handle restricted to a single tenant's rows
#[derive(Debug, Clone)]
pub struct TenantScoped<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    collection: MongoCollection<T>,
    tenant_id: Uuid,
}

impl<T> TenantScoped<T>
where
    T: Serialize
        + DeserializeOwned
        + Unpin
        + Send
        + Sync
        + Default
        + IntoIndexes
        + MutMetadata
        + TenantOwned,
{
    pub fn new(collection: MongoCollection<T>, tenant_id: Uuid) -> Self {
        Self {
            collection,
            tenant_id,
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Merge the tenant predicate into a caller filter. The predicate is
    /// inserted last so it wins over any caller-supplied tenant key.
    fn scoped(&self, mut filter: Document) -> Document {
        filter.insert("tenant_id", self.tenant_id.to_string());
        filter
    }

    /// Insert a document owned by this scope's tenant
    pub async fn insert_one(&self, item: T) -> Result<()> {
        if item.tenant_id() != self.tenant_id {
            return Err(BeaconError::Internal(
                "document tenant does not match scope".into(),
            ));
        }
        self.collection.insert_one(item).await?;
        Ok(())
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        self.collection.find_one(self.scoped(filter)).await
    }

    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<T>> {
        self.collection
            .find_many(self.scoped(filter), sort, limit)
            .await
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult> {
        self.collection.update_one(self.scoped(filter), update).await
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.collection.count(self.scoped(filter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    // Exercises the filter-merging logic without a running MongoDB.
    fn scope_filter(tenant_id: Uuid, filter: Document) -> Document {
        let mut filter = filter;
        filter.insert("tenant_id", tenant_id.to_string());
        filter
    }

    #[test]
    fn test_tenant_predicate_injected() {
        let tenant = Uuid::new_v4();
        let scoped = scope_filter(tenant, doc! { "id": "abc" });
        assert_eq!(scoped.get_str("tenant_id").unwrap(), tenant.to_string());
        assert_eq!(scoped.get_str("id").unwrap(), "abc");
    }

    #[test]
    fn test_tenant_predicate_overrides_caller_value() {
        let tenant = Uuid::new_v4();
        let foreign = Uuid::new_v4();
        let scoped = scope_filter(tenant, doc! { "tenant_id": foreign.to_string() });
        assert_eq!(scoped.get_str("tenant_id").unwrap(), tenant.to_string());
    }
}
