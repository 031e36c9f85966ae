//! Dead-letter store
//!
//! One durable row per failed delivery. The sweep query returns due rows
//! newest first, and rows are claimed with a conditional update before any
//! external call so two sweepers (or a sweeper racing its own restart)
//! cannot both send the same row.

use bson::doc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::schemas::{DeadLetterDoc, DeadLetterStatus};
use crate::db::MongoCollection;
use crate::events::LocationEvent;
use crate::types::Result;

/// Counts by status for the stats surface
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeadLetterStats {
    pub pending: u64,
    pub retried: u64,
    pub resolved: u64,
    pub permanently_failed: u64,
}

/// Durable record of failed deliveries
#[derive(Clone)]
pub struct DeadLetterStore {
    collection: MongoCollection<DeadLetterDoc>,
}

impl DeadLetterStore {
    pub fn new(collection: MongoCollection<DeadLetterDoc>) -> Self {
        Self { collection }
    }

    /// Record a failed delivery, due for its first retry in one minute
    pub async fn record_failure(&self, event: &LocationEvent, error: &str) -> Result<()> {
        let row = DeadLetterDoc::from_failed_event(event, error);
        let next_retry_at = row.next_retry_at;
        self.collection.insert_one(row).await?;

        info!(
            event_id = %event.id,
            tenant_id = %event.tenant_id,
            next_retry_at = ?next_retry_at,
            error,
            "Failed location update stored for retry"
        );
        Ok(())
    }

    /// Due pending rows, newest first. Newest-first matters: during a
    /// sustained sink outage the freshest positions are the operationally
    /// relevant ones, and FIFO would starve them behind the stale backlog.
    pub async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<DeadLetterDoc>> {
        self.collection
            .find_many(
                doc! {
                    "status": "pending",
                    "next_retry_at": { "$lte": bson::DateTime::from_chrono(now) },
                },
                Some(doc! { "metadata.created_at": -1 }),
                Some(limit),
            )
            .await
    }

    /// Claim a row for retry. The pending-state condition makes the claim
    /// exclusive: `None` means another worker owns the row or it already
    /// reached a terminal state.
    pub async fn claim(&self, id: Uuid) -> Result<Option<DeadLetterDoc>> {
        self.collection
            .find_one_and_update(
                doc! { "id": id.to_string(), "status": "pending" },
                doc! { "$set": {
                    "status": "retried",
                    "metadata.updated_at": bson::DateTime::now(),
                }},
            )
            .await
    }

    /// Terminal transition: delivered on retry
    pub async fn resolve(&self, id: Uuid) -> Result<()> {
        self.collection
            .update_one(
                doc! { "id": id.to_string() },
                doc! { "$set": {
                    "status": "resolved",
                    "resolved_at": bson::DateTime::now(),
                    "metadata.updated_at": bson::DateTime::now(),
                }},
            )
            .await?;
        Ok(())
    }

    /// Terminal transition: no further retries
    pub async fn permanently_fail(&self, id: Uuid, reason: &str) -> Result<()> {
        self.collection
            .update_one(
                doc! { "id": id.to_string() },
                doc! { "$set": {
                    "status": "permanently_failed",
                    "last_error": reason,
                    "resolved_at": bson::DateTime::now(),
                    "metadata.updated_at": bson::DateTime::now(),
                }},
            )
            .await?;
        Ok(())
    }

    /// Requeue a claimed row for a later attempt
    pub async fn reschedule(
        &self,
        id: Uuid,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        self.collection
            .update_one(
                doc! { "id": id.to_string() },
                doc! { "$set": {
                    "status": "pending",
                    "retry_count": retry_count,
                    "next_retry_at": bson::DateTime::from_chrono(next_retry_at),
                    "last_error": error,
                    "metadata.updated_at": bson::DateTime::now(),
                }},
            )
            .await?;
        Ok(())
    }

    /// Counts by status
    pub async fn stats(&self) -> Result<DeadLetterStats> {
        let count = |status: DeadLetterStatus| {
            self.collection.count(doc! { "status": status.as_str() })
        };

        Ok(DeadLetterStats {
            pending: count(DeadLetterStatus::Pending).await?,
            retried: count(DeadLetterStatus::Retried).await?,
            resolved: count(DeadLetterStatus::Resolved).await?,
            permanently_failed: count(DeadLetterStatus::PermanentlyFailed).await?,
        })
    }
}
