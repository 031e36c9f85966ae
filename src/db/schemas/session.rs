//! Tracking session schema
//!
//! A session is the bounded-duration window during which one subject may
//! submit location fixes. At most one active session exists per subject;
//! the partial unique index below backstops the check made at creation.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Duration, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};

/// Collection name for tracking sessions
pub const SESSION_COLLECTION: &str = "sessions";

/// Lifecycle status of a tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Ended,
    Expired,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A location tracking session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSessionDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    /// Standard metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Session id exposed to clients
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Identity-provider subject of the session owner
    pub subject: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: SessionStatus,

    /// When the session started
    pub started_at: bson::DateTime,

    /// Set exactly when the session leaves `active`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<bson::DateTime>,

    /// Authorized duration in seconds
    pub duration_secs: i64,
}

impl Default for TrackingSessionDoc {
    fn default() -> Self {
        Self {
            oid: None,
            metadata: Metadata::default(),
            id: Uuid::default(),
            tenant_id: Uuid::default(),
            subject: String::default(),
            status: SessionStatus::default(),
            started_at: bson::DateTime::from_millis(0),
            ended_at: None,
            duration_secs: i64::default(),
        }
    }
}

impl TrackingSessionDoc {
    /// Create a new active session starting now
    pub fn new(tenant_id: Uuid, subject: &str, duration_secs: i64) -> Self {
        Self {
            oid: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4(),
            tenant_id,
            subject: subject.to_string(),
            status: SessionStatus::Active,
            started_at: bson::DateTime::now(),
            ended_at: None,
            duration_secs,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Start time as a chrono timestamp
    pub fn started_at_utc(&self) -> DateTime<Utc> {
        self.started_at.to_chrono()
    }

    /// Whether the authorized window has lapsed at `now`
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at_utc() > Duration::seconds(self.duration_secs)
    }

    /// Wall-clock lifetime remaining at `now`; `None` once lapsed
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        let deadline = self.started_at_utc() + Duration::seconds(self.duration_secs);
        (deadline - now).to_std().ok()
    }
}

impl IntoIndexes for TrackingSessionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique session id for client-facing lookups
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("session_id_unique".to_string())
                        .build(),
                ),
            ),
            // One active session per subject, enforced at the storage layer
            (
                doc! { "subject": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "status": "active" })
                        .name("one_active_per_subject".to_string())
                        .build(),
                ),
            ),
            // Tenant-scoped listings, newest first
            (
                doc! { "tenant_id": 1, "subject": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("tenant_subject_created".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for TrackingSessionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_active() {
        let session = TrackingSessionDoc::new(Uuid::new_v4(), "subject-1", 600);
        assert!(session.is_active());
        assert!(session.ended_at.is_none());
        assert_eq!(session.duration_secs, 600);
    }

    #[test]
    fn test_lapse_boundary() {
        let mut session = TrackingSessionDoc::new(Uuid::new_v4(), "s", 600);
        let start = session.started_at_utc();
        assert!(!session.is_lapsed(start + Duration::seconds(600)));
        assert!(session.is_lapsed(start + Duration::seconds(601)));

        session.duration_secs = 1;
        assert!(session.is_lapsed(start + Duration::seconds(2)));
    }

    #[test]
    fn test_remaining_none_after_lapse() {
        let session = TrackingSessionDoc::new(Uuid::new_v4(), "s", 1);
        let start = session.started_at_utc();
        assert!(session.remaining(start).is_some());
        assert!(session.remaining(start + Duration::seconds(5)).is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_value(SessionStatus::Active).unwrap();
        assert_eq!(json, "active");
        let json = serde_json::to_value(SessionStatus::Expired).unwrap();
        assert_eq!(json, "expired");
    }
}
