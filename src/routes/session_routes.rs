//! Tracking session routes
//!
//! - POST /session/start          - open a tracking session
//! - POST /session/{id}/stop      - stop an active session
//! - GET  /session/{id}           - fetch one session
//! - GET  /sessions               - list the caller's sessions
//! - GET  /session/{id}/locations - fixes recorded under a session

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::respond::{created, error, ok};
use crate::auth::AuthContext;
use crate::server::AppState;
use crate::types::BeaconError;

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Authorized duration in seconds; server default when omitted
    #[serde(default)]
    pub duration: Option<i64>,
}

/// Handle POST /session/start
pub async fn handle_start_session(
    state: Arc<AppState>,
    ctx: &AuthContext,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let request: StartSessionRequest = if body.is_empty() {
        StartSessionRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(_) => return error(&BeaconError::BadRequest("Invalid request format".into())),
        }
    };

    let duration = match request.duration {
        None => state.args.default_session_duration_secs,
        Some(d) if d > 0 => d,
        Some(_) => return error(&BeaconError::BadRequest("Duration must be positive".into())),
    };

    match state.authority.create_session(ctx, duration).await {
        Ok(session) => created("Session started successfully", session),
        Err(e) => error(&e),
    }
}

/// Handle POST /session/{id}/stop
pub async fn handle_stop_session(
    state: Arc<AppState>,
    ctx: &AuthContext,
    session_id: &str,
) -> Response<Full<Bytes>> {
    let session_id = match parse_session_id(session_id) {
        Ok(id) => id,
        Err(e) => return error(&e),
    };

    match state.authority.end_session(ctx, session_id).await {
        Ok(session) => ok("Session stopped successfully", session),
        Err(e) => error(&e),
    }
}

/// Handle GET /session/{id}
pub async fn handle_get_session(
    state: Arc<AppState>,
    ctx: &AuthContext,
    session_id: &str,
) -> Response<Full<Bytes>> {
    let session_id = match parse_session_id(session_id) {
        Ok(id) => id,
        Err(e) => return error(&e),
    };

    match state.authority.get_session(ctx, session_id).await {
        Ok(session) => ok("Session retrieved successfully", session),
        Err(e) => error(&e),
    }
}

/// Handle GET /sessions
pub async fn handle_list_sessions(
    state: Arc<AppState>,
    ctx: &AuthContext,
) -> Response<Full<Bytes>> {
    match state.authority.list_sessions(ctx).await {
        Ok(sessions) => ok("Sessions retrieved successfully", sessions),
        Err(e) => error(&e),
    }
}

/// Handle GET /session/{id}/locations
pub async fn handle_session_locations(
    state: Arc<AppState>,
    ctx: &AuthContext,
    session_id: &str,
) -> Response<Full<Bytes>> {
    let session_id = match parse_session_id(session_id) {
        Ok(id) => id,
        Err(e) => return error(&e),
    };

    match state.authority.list_fixes(ctx, session_id).await {
        Ok(fixes) => ok("Locations retrieved successfully", fixes),
        Err(e) => error(&e),
    }
}

fn parse_session_id(raw: &str) -> crate::types::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| BeaconError::BadRequest("Invalid session ID".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_id() {
        assert!(parse_session_id(&Uuid::new_v4().to_string()).is_ok());
        assert!(parse_session_id("not-a-uuid").is_err());
        assert!(parse_session_id("").is_err());
    }

    #[test]
    fn test_start_request_duration_optional() {
        let parsed: StartSessionRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.duration, None);

        let parsed: StartSessionRequest = serde_json::from_str(r#"{"duration":120}"#).unwrap();
        assert_eq!(parsed.duration, Some(120));
    }
}
