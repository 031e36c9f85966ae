//! Location ingestion fast path
//!
//! POST /update validates the session with a cache-first lookup, persists
//! the fix, and hands the event to the producer pool. The cached session is
//! a hint only: tenant and subject are re-checked against the request
//! context, and any mismatch falls through to storage. Once the fix is
//! durable the request succeeds; a saturated producer queue costs only the
//! event, recorded in the drop counter.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::Response;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::respond::{error, ok};
use crate::auth::AuthContext;
use crate::db::schemas::{coordinates_in_bounds, FixDoc, TrackingSessionDoc};
use crate::events::{LocationEvent, LOCATION_EVENT_TYPE};
use crate::server::AppState;
use crate::types::BeaconError;

#[derive(Debug, Deserialize)]
pub struct LocationUpdateRequest {
    pub session_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    /// Observation time; server now when omitted
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Handle POST /update
pub async fn handle_location_update(
    state: Arc<AppState>,
    ctx: &AuthContext,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let request: LocationUpdateRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(_) => return error(&BeaconError::BadRequest("Invalid request format".into())),
    };

    if !coordinates_in_bounds(request.latitude, request.longitude) {
        return error(&BeaconError::BadRequest(
            "Coordinates out of geographic bounds".into(),
        ));
    }

    let session = match resolve_active_session(&state, ctx, request.session_id).await {
        Ok(s) => s,
        Err(e) => return error(&e),
    };

    // Expiry check applies to cache hits and storage loads alike
    if session.is_lapsed(Utc::now()) {
        if let Err(e) = state
            .authority
            .expire_session(ctx, request.session_id)
            .await
        {
            warn!(session_id = %request.session_id, "Failed to expire session: {}", e);
        }
        return error(&BeaconError::BadRequest("Session has expired".into()));
    }

    let timestamp = request.timestamp.unwrap_or_else(Utc::now);
    let fix = FixDoc::new(
        ctx.tenant_id,
        request.session_id,
        &ctx.subject,
        request.latitude,
        request.longitude,
        timestamp,
    );

    // The fix must be durable before anything else happens; storage failure
    // aborts with no partial state
    if let Err(e) = state.authority.scoped_fixes(ctx).insert_one(fix.clone()).await {
        return error(&e);
    }

    let event = LocationEvent {
        id: fix.id,
        tenant_id: ctx.tenant_id,
        user_id: ctx.subject.clone(),
        session_id: request.session_id,
        latitude: request.latitude,
        longitude: request.longitude,
        timestamp,
        event_type: LOCATION_EVENT_TYPE.to_string(),
    };

    // Non-blocking: a full queue drops the event and the drop counter
    // records it; the fix is already durable
    if let Err(e) = state.producer.try_send(event) {
        warn!(fix_id = %fix.id, "Event not enqueued: {}", e);
    }

    ok("Location updated successfully", fix)
}

/// Resolve the caller's active session, cache first.
async fn resolve_active_session(
    state: &AppState,
    ctx: &AuthContext,
    session_id: Uuid,
) -> crate::types::Result<TrackingSessionDoc> {
    if let Some(cached) = state.authority.cache().get(session_id) {
        // Hint only: a cached record for another tenant or subject is a miss
        if cached.tenant_id == ctx.tenant_id && cached.subject == ctx.subject {
            debug!(session_id = %session_id, "Session cache hit");
            return Ok(cached);
        }
        debug!(session_id = %session_id, "Session cache hit rejected by context check");
    }

    let session = state
        .authority
        .get_active_session(ctx, session_id)
        .await?
        .ok_or_else(|| BeaconError::NotFound("Active session not found".into()))?;

    // Re-cache for subsequent updates, bounded by the remaining lifetime
    state.authority.cache().put(&session);

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_requires_session_id() {
        let result: Result<LocationUpdateRequest, _> =
            serde_json::from_str(r#"{"latitude":1.0,"longitude":2.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_timestamp_optional() {
        let json = format!(
            r#"{{"session_id":"{}","latitude":40.0,"longitude":-74.0}}"#,
            Uuid::new_v4()
        );
        let parsed: LocationUpdateRequest = serde_json::from_str(&json).unwrap();
        assert!(parsed.timestamp.is_none());

        let json = format!(
            r#"{{"session_id":"{}","latitude":40.0,"longitude":-74.0,"timestamp":"2024-01-01T00:00:01Z"}}"#,
            Uuid::new_v4()
        );
        let parsed: LocationUpdateRequest = serde_json::from_str(&json).unwrap();
        assert!(parsed.timestamp.is_some());
    }
}
