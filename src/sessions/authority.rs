//! Session authority
//!
//! Owns the session table and the tenant isolation predicate. All session
//! reads and writes for request handling flow through tenant-scoped
//! collection handles built from the authenticated context; the single
//! exception is `session_status`, the unscoped status-only probe used by
//! retry gating.

use bson::doc;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::cache::SessionCache;
use crate::db::schemas::{FixDoc, SessionStatus, TrackingSessionDoc};
use crate::db::{MongoCollection, TenantScoped};
use crate::types::{BeaconError, Result};

/// Session lifecycle owner
pub struct SessionAuthority {
    sessions: MongoCollection<TrackingSessionDoc>,
    fixes: MongoCollection<FixDoc>,
    cache: Arc<SessionCache>,
}

impl SessionAuthority {
    pub fn new(
        sessions: MongoCollection<TrackingSessionDoc>,
        fixes: MongoCollection<FixDoc>,
        cache: Arc<SessionCache>,
    ) -> Self {
        Self {
            sessions,
            fixes,
            cache,
        }
    }

    /// Tenant-scoped session handle for a request context
    pub fn scoped_sessions(&self, ctx: &AuthContext) -> TenantScoped<TrackingSessionDoc> {
        TenantScoped::new(self.sessions.clone(), ctx.tenant_id)
    }

    /// Tenant-scoped fix handle for a request context
    pub fn scoped_fixes(&self, ctx: &AuthContext) -> TenantScoped<FixDoc> {
        TenantScoped::new(self.fixes.clone(), ctx.tenant_id)
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Start a new tracking session for the caller.
    ///
    /// At most one active session may exist per subject; a second start is
    /// rejected as a conflict. The check here races only with itself; the
    /// partial unique index on active sessions backstops it.
    pub async fn create_session(
        &self,
        ctx: &AuthContext,
        duration_secs: i64,
    ) -> Result<TrackingSessionDoc> {
        let scoped = self.scoped_sessions(ctx);

        let existing = scoped
            .find_one(doc! { "subject": &ctx.subject, "status": "active" })
            .await?;
        if existing.is_some() {
            return Err(BeaconError::Conflict(
                "User already has an active session".into(),
            ));
        }

        let session = TrackingSessionDoc::new(ctx.tenant_id, &ctx.subject, duration_secs);
        scoped.insert_one(session.clone()).await?;
        self.cache.put(&session);

        info!(
            session_id = %session.id,
            tenant_id = %ctx.tenant_id,
            duration_secs,
            "Tracking session started"
        );
        Ok(session)
    }

    /// Look up one of the caller's sessions
    pub async fn get_session(
        &self,
        ctx: &AuthContext,
        session_id: Uuid,
    ) -> Result<TrackingSessionDoc> {
        self.scoped_sessions(ctx)
            .find_one(doc! { "id": session_id.to_string(), "subject": &ctx.subject })
            .await?
            .ok_or_else(|| BeaconError::NotFound("Session not found".into()))
    }

    /// Look up the caller's session only if it is currently active
    pub async fn get_active_session(
        &self,
        ctx: &AuthContext,
        session_id: Uuid,
    ) -> Result<Option<TrackingSessionDoc>> {
        self.scoped_sessions(ctx)
            .find_one(doc! {
                "id": session_id.to_string(),
                "subject": &ctx.subject,
                "status": "active",
            })
            .await
    }

    /// All sessions of the caller, newest first
    pub async fn list_sessions(&self, ctx: &AuthContext) -> Result<Vec<TrackingSessionDoc>> {
        self.scoped_sessions(ctx)
            .find_many(
                doc! { "subject": &ctx.subject },
                Some(doc! { "metadata.created_at": -1 }),
                None,
            )
            .await
    }

    /// Fixes recorded under one of the caller's sessions, in observation order
    pub async fn list_fixes(&self, ctx: &AuthContext, session_id: Uuid) -> Result<Vec<FixDoc>> {
        // Visibility check first; foreign sessions present as not found
        self.get_session(ctx, session_id).await?;

        self.scoped_fixes(ctx)
            .find_many(
                doc! { "session_id": session_id.to_string() },
                Some(doc! { "timestamp": 1 }),
                None,
            )
            .await
    }

    /// Stop an active session. Transitions active -> ended and records the
    /// realized duration. Stopping an already-ended session is a no-op that
    /// returns the session unchanged.
    pub async fn end_session(
        &self,
        ctx: &AuthContext,
        session_id: Uuid,
    ) -> Result<TrackingSessionDoc> {
        let scoped = self.scoped_sessions(ctx);

        let session = scoped
            .find_one(doc! { "id": session_id.to_string(), "subject": &ctx.subject })
            .await?
            .ok_or_else(|| BeaconError::NotFound("Session not found".into()))?;

        match session.status {
            SessionStatus::Active => {}
            SessionStatus::Ended => return Ok(session),
            _ => return Err(BeaconError::BadRequest("Session is not active".into())),
        }

        let now = Utc::now();
        let realized_secs = (now - session.started_at_utc()).num_seconds();
        let ended_at = bson::DateTime::from_chrono(now);
        scoped
            .update_one(
                doc! { "id": session_id.to_string(), "status": "active" },
                doc! { "$set": {
                    "status": "ended",
                    "ended_at": ended_at,
                    "duration_secs": realized_secs,
                    "metadata.updated_at": bson::DateTime::now(),
                }},
            )
            .await?;
        self.cache.invalidate(session_id);

        info!(session_id = %session_id, tenant_id = %ctx.tenant_id, "Tracking session stopped");

        // Mirror the row the update just wrote, update timestamp included
        let mut ended = session;
        ended.status = SessionStatus::Ended;
        ended.ended_at = Some(ended_at);
        ended.duration_secs = realized_secs;
        ended.metadata.touch();
        Ok(ended)
    }

    /// Expire a session whose authorized window has lapsed. Driven by the
    /// ingest path on write; conditional on the session still being active
    /// so it cannot resurrect an ended session.
    pub async fn expire_session(&self, ctx: &AuthContext, session_id: Uuid) -> Result<()> {
        self.scoped_sessions(ctx)
            .update_one(
                doc! {
                    "id": session_id.to_string(),
                    "subject": &ctx.subject,
                    "status": "active",
                },
                doc! { "$set": {
                    "status": "expired",
                    "ended_at": bson::DateTime::now(),
                    "metadata.updated_at": bson::DateTime::now(),
                }},
            )
            .await?;
        self.cache.invalidate(session_id);

        info!(session_id = %session_id, tenant_id = %ctx.tenant_id, "Tracking session expired");
        Ok(())
    }

    /// Raw status of a session, regardless of tenant.
    ///
    /// Used only by retry gating: the scheduler has no request tenant to
    /// scope by, and a bare status leaks no payload across tenants.
    pub async fn session_status(&self, session_id: Uuid) -> Result<Option<SessionStatus>> {
        let session = self
            .sessions
            .find_one(doc! { "id": session_id.to_string() })
            .await?;
        Ok(session.map(|s| s.status))
    }
}
