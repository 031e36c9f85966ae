//! Retry scheduler
//!
//! Periodic sweep over due dead letters. Each picked row is claimed with a
//! conditional update, gated on its session still being active, re-POSTed
//! to the external sink, and driven to `resolved`, back to `pending` with
//! exponential backoff, or to `permanently_failed`.
//!
//! Session gating is what keeps a recovered sink from being flooded with
//! fixes for sessions that were closed or expired during the outage: those
//! rows terminate without an external call.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::store::DeadLetterStore;
use crate::db::schemas::{backoff_delay, DeadLetterDoc, SessionStatus};
use crate::delivery::ThirdPartyClient;
use crate::sessions::SessionAuthority;
use crate::types::Result;

/// Retry policy knobs
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts before a row is permanently failed
    pub max_retries: i32,
    /// Rows picked up per sweep
    pub batch_size: i64,
    /// Time between sweeps
    pub check_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            batch_size: 100,
            check_interval: Duration::from_secs(30),
        }
    }
}

/// Periodic dead-letter sweeper
pub struct RetryScheduler {
    store: DeadLetterStore,
    sessions: Arc<SessionAuthority>,
    delivery: Arc<ThirdPartyClient>,
    config: RetryConfig,
}

impl RetryScheduler {
    pub fn new(
        store: DeadLetterStore,
        sessions: Arc<SessionAuthority>,
        delivery: Arc<ThirdPartyClient>,
        config: RetryConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            delivery,
            config,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run sweeps until shutdown is signalled. Errors inside a sweep are
    /// logged and the loop continues; the scheduler never reports upward.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "Retry scheduler started (max_retries={}, batch_size={}, interval={:?})",
            self.config.max_retries, self.config.batch_size, self.config.check_interval
        );

        loop {
            if let Err(e) = self.sweep().await {
                error!("Retry sweep failed: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.check_interval) => {}
                _ = shutdown_rx.changed() => {
                    info!("Retry scheduler stopped");
                    return;
                }
            }
        }
    }

    /// One pass over due rows, newest first
    pub async fn sweep(&self) -> Result<usize> {
        let due = self
            .store
            .find_due(Utc::now(), self.config.batch_size)
            .await?;

        if due.is_empty() {
            debug!("No failed updates to retry");
            return Ok(0);
        }

        info!("Processing {} failed updates for retry", due.len());

        let mut processed = 0;
        for row in due {
            let id = row.id;
            // Claim before any external call; a lost claim means another
            // worker already owns the row
            match self.store.claim(id).await {
                Ok(Some(claimed)) => {
                    if let Err(e) = self.retry_row(claimed).await {
                        error!(dead_letter_id = %id, "Retry step failed: {}", e);
                    }
                    processed += 1;
                }
                Ok(None) => {
                    debug!(dead_letter_id = %id, "Row already claimed, skipping");
                }
                Err(e) => {
                    error!(dead_letter_id = %id, "Claim failed: {}", e);
                }
            }
        }

        Ok(processed)
    }

    /// Retry one claimed row
    async fn retry_row(&self, row: DeadLetterDoc) -> Result<()> {
        // Session gating: a fix for a session that is no longer active is
        // never re-sent
        if let Some(session_id) = row.session_id {
            match self.sessions.session_status(session_id).await? {
                Some(SessionStatus::Active) => {}
                Some(status) => {
                    warn!(
                        dead_letter_id = %row.id,
                        session_id = %session_id,
                        status = status.as_str(),
                        "Session no longer active, abandoning retry"
                    );
                    return self
                        .store
                        .permanently_fail(
                            row.id,
                            &format!("session inactive (status={})", status.as_str()),
                        )
                        .await;
                }
                None => {
                    warn!(
                        dead_letter_id = %row.id,
                        session_id = %session_id,
                        "Session not found, abandoning retry"
                    );
                    return self
                        .store
                        .permanently_fail(row.id, "session inactive (status=not found)")
                        .await;
                }
            }
        }

        let event = row.rebuild_event();
        match self.delivery.send_location_update(&event).await {
            Ok(()) => {
                info!(dead_letter_id = %row.id, event_id = %event.id, "Retry delivered");
                self.store.resolve(row.id).await
            }
            Err(e) => {
                let retry_count = row.retry_count + 1;
                if retry_count >= self.config.max_retries {
                    warn!(
                        dead_letter_id = %row.id,
                        retry_count,
                        "Max retries reached, permanently failing"
                    );
                    self.store
                        .permanently_fail(row.id, &format!("max retries reached: {}", e))
                        .await
                } else {
                    let next_retry_at = Utc::now() + backoff_delay(retry_count);
                    debug!(
                        dead_letter_id = %row.id,
                        retry_count,
                        next_retry_at = %next_retry_at,
                        "Retry failed, rescheduling"
                    );
                    self.store
                        .reschedule(row.id, retry_count, next_retry_at, &e.to_string())
                        .await
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 8);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.check_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_ceiling_reached_at_max() {
        // A row at retry_count 7 fails its eighth attempt and hits the
        // ceiling; the last reschedulable attempt waits 64 minutes
        let config = RetryConfig::default();
        let failing_count = 7 + 1;
        assert!(failing_count >= config.max_retries);
        assert_eq!(backoff_delay(7), chrono::Duration::minutes(64));
    }
}
