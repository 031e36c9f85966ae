//! Dead letter schema
//!
//! One row per event whose delivery to the external sink failed. Rows are
//! revived by the retry scheduler and driven to a terminal state; terminal
//! rows are never mutated again.

use bson::{doc, oid::ObjectId, Document};
use chrono::{Duration, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::events::LocationEvent;

/// Collection name for dead letters
pub const DEAD_LETTER_COLLECTION: &str = "dead_letters";

/// Base delay before the first retry; doubles per attempt
pub const RETRY_BASE_DELAY_SECS: i64 = 60;

/// Retry state of a dead letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterStatus {
    /// Waiting for its next retry
    #[default]
    Pending,
    /// Claimed by a sweep worker with the external call in flight
    Retried,
    /// Delivered on retry
    Resolved,
    /// Gave up: retry ceiling hit or session no longer active
    PermanentlyFailed,
}

impl DeadLetterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retried => "retried",
            Self::Resolved => "resolved",
            Self::PermanentlyFailed => "permanently_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::PermanentlyFailed)
    }
}

/// A failed location event awaiting retry
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeadLetterDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    /// Standard metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Dead letter id
    pub id: Uuid,

    /// Event id of the failed delivery (equals the fix id)
    pub original_event_id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Identity-provider subject the event belongs to
    pub subject: String,

    /// Session the event was recorded under, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// Most recent delivery error
    pub last_error: String,

    /// Completed retry attempts
    #[serde(default)]
    pub retry_count: i32,

    #[serde(default)]
    pub status: DeadLetterStatus,

    /// Due time of the next retry while `pending`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<bson::DateTime>,

    /// Set on entering a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<bson::DateTime>,
}

impl DeadLetterDoc {
    /// Record a failed delivery, due for its first retry in one minute
    pub fn from_failed_event(event: &LocationEvent, error: &str) -> Self {
        Self {
            oid: None,
            metadata: Metadata::new(),
            id: Uuid::new_v4(),
            original_event_id: event.id,
            tenant_id: event.tenant_id,
            subject: event.user_id.clone(),
            session_id: Some(event.session_id),
            latitude: Some(event.latitude),
            longitude: Some(event.longitude),
            last_error: error.to_string(),
            retry_count: 0,
            status: DeadLetterStatus::Pending,
            next_retry_at: Some(bson::DateTime::from_chrono(
                Utc::now() + Duration::seconds(RETRY_BASE_DELAY_SECS),
            )),
            resolved_at: None,
        }
    }

    /// Rebuild the bus event for a retry POST. Coordinates default to the
    /// origin when the original values were lost.
    pub fn rebuild_event(&self) -> LocationEvent {
        LocationEvent {
            id: self.original_event_id,
            tenant_id: self.tenant_id,
            user_id: self.subject.clone(),
            session_id: self.session_id.unwrap_or_default(),
            latitude: self.latitude.unwrap_or_default(),
            longitude: self.longitude.unwrap_or_default(),
            timestamp: Utc::now(),
            event_type: crate::events::LOCATION_EVENT_TYPE.to_string(),
        }
    }
}

/// Backoff delay applied after the `retry_count`-th failed attempt:
/// 1, 2, 4, 8, 16, 32, 64, 128 minutes.
pub fn backoff_delay(retry_count: i32) -> Duration {
    let exponent = (retry_count - 1).clamp(0, 32) as u32;
    Duration::seconds(RETRY_BASE_DELAY_SECS << exponent)
}

impl IntoIndexes for DeadLetterDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("dead_letter_id_unique".to_string())
                        .build(),
                ),
            ),
            // Sweep lookup: due pending rows, newest first
            (
                doc! { "status": 1, "next_retry_at": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("sweep_lookup".to_string())
                        .build(),
                ),
            ),
            // Tenant-scoped administrative views
            (
                doc! { "tenant_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("dead_letter_tenant".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for DeadLetterDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> LocationEvent {
        LocationEvent {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            user_id: "subject-1".to_string(),
            session_id: Uuid::new_v4(),
            latitude: 40.0,
            longitude: -74.0,
            timestamp: Utc::now(),
            event_type: crate::events::LOCATION_EVENT_TYPE.to_string(),
        }
    }

    #[test]
    fn test_from_failed_event_initial_state() {
        let event = sample_event();
        let row = DeadLetterDoc::from_failed_event(&event, "third-party returned status 500");
        assert_eq!(row.status, DeadLetterStatus::Pending);
        assert_eq!(row.retry_count, 0);
        assert_eq!(row.original_event_id, event.id);
        assert_eq!(row.session_id, Some(event.session_id));

        let due = row.next_retry_at.unwrap().to_chrono();
        let delta = due - Utc::now();
        assert!(delta <= Duration::seconds(60));
        assert!(delta > Duration::seconds(55));
    }

    #[test]
    fn test_backoff_table() {
        let minutes = [1, 2, 4, 8, 16, 32, 64, 128];
        for (attempt, expected) in minutes.iter().enumerate() {
            let delay = backoff_delay(attempt as i32 + 1);
            assert_eq!(delay, Duration::minutes(*expected));
        }
    }

    #[test]
    fn test_backoff_floor() {
        // retry_count below 1 never produces a sub-minute delay
        assert_eq!(backoff_delay(0), Duration::seconds(60));
    }

    #[test]
    fn test_rebuild_event_carries_original_id() {
        let event = sample_event();
        let row = DeadLetterDoc::from_failed_event(&event, "timeout");
        let rebuilt = row.rebuild_event();
        assert_eq!(rebuilt.id, event.id);
        assert_eq!(rebuilt.tenant_id, event.tenant_id);
        assert_eq!(rebuilt.latitude, event.latitude);
        assert_eq!(rebuilt.event_type, "location_update");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DeadLetterStatus::Resolved.is_terminal());
        assert!(DeadLetterStatus::PermanentlyFailed.is_terminal());
        assert!(!DeadLetterStatus::Pending.is_terminal());
        assert!(!DeadLetterStatus::Retried.is_terminal());
    }
}
