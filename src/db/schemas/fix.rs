//! Location fix schema
//!
//! A fix is a single immutable geographic observation submitted during an
//! active session.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};

/// Collection name for fixes
pub const FIX_COLLECTION: &str = "fixes";

/// Geographic latitude bounds, degrees
pub const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;

/// Geographic longitude bounds, degrees
pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// A single geographic observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    /// Standard metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Fix id; doubles as the event id on the bus
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Session the fix was submitted under
    pub session_id: Uuid,

    /// Identity-provider subject of the submitter
    pub subject: String,

    pub latitude: f64,
    pub longitude: f64,

    /// Observation time (client-supplied or server now)
    pub timestamp: bson::DateTime,
}

impl Default for FixDoc {
    fn default() -> Self {
        Self {
            oid: None,
            metadata: Metadata::default(),
            id: Uuid::default(),
            tenant_id: Uuid::default(),
            session_id: Uuid::default(),
            subject: String::default(),
            latitude: f64::default(),
            longitude: f64::default(),
            timestamp: bson::DateTime::from_millis(0),
        }
    }
}

impl FixDoc {
    pub fn new(
        tenant_id: Uuid,
        session_id: Uuid,
        subject: &str,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            oid: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4(),
            tenant_id,
            session_id,
            subject: subject.to_string(),
            latitude,
            longitude,
            timestamp: bson::DateTime::from_chrono(timestamp),
        }
    }
}

/// Validate geographic bounds for an incoming coordinate pair
pub fn coordinates_in_bounds(latitude: f64, longitude: f64) -> bool {
    LATITUDE_RANGE.contains(&latitude) && LONGITUDE_RANGE.contains(&longitude)
}

impl IntoIndexes for FixDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("fix_id_unique".to_string())
                        .build(),
                ),
            ),
            // Session history reads, in observation order
            (
                doc! { "session_id": 1, "tenant_id": 1, "timestamp": 1 },
                Some(
                    IndexOptions::builder()
                        .name("session_tenant_timestamp".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "tenant_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("fix_tenant".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for FixDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(coordinates_in_bounds(0.0, 0.0));
        assert!(coordinates_in_bounds(90.0, 180.0));
        assert!(coordinates_in_bounds(-90.0, -180.0));
        assert!(!coordinates_in_bounds(90.1, 0.0));
        assert!(!coordinates_in_bounds(0.0, -180.5));
        assert!(!coordinates_in_bounds(-91.0, 181.0));
    }

    #[test]
    fn test_fix_ids_are_unique() {
        let tenant = Uuid::new_v4();
        let session = Uuid::new_v4();
        let a = FixDoc::new(tenant, session, "s", 1.0, 2.0, Utc::now());
        let b = FixDoc::new(tenant, session, "s", 1.0, 2.0, Utc::now());
        assert_ne!(a.id, b.id);
    }
}
