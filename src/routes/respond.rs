//! JSON response helpers
//!
//! All bodies follow the response-envelope convention:
//! `{"success": bool, "message": …, "data": …}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::types::BeaconError;

/// Build a JSON response with the given status
pub fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(&body)
        .unwrap_or_else(|_| r#"{"success":false,"message":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// 200 with a data payload
pub fn ok<T: Serialize>(message: &str, data: T) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        json!({ "success": true, "message": message, "data": data }),
    )
}

/// 201 with a data payload
pub fn created<T: Serialize>(message: &str, data: T) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::CREATED,
        json!({ "success": true, "message": message, "data": data }),
    )
}

/// Error response with the status the error maps to
pub fn error(err: &BeaconError) -> Response<Full<Bytes>> {
    let message = match err {
        // Internal detail stays in the logs
        BeaconError::Database(_) | BeaconError::Internal(_) => "Internal server error".to_string(),
        other => strip_prefix(other),
    };

    json_response(
        err.status_code(),
        json!({ "success": false, "message": message }),
    )
}

/// 404 for unmatched paths
pub fn not_found(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        json!({ "success": false, "message": format!("No route for {}", path) }),
    )
}

// Error Display output carries a category prefix ("Bad request: …"); the
// client-facing message is just the tail.
fn strip_prefix(err: &BeaconError) -> String {
    let text = err.to_string();
    match text.split_once(": ") {
        Some((_, tail)) => tail.to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let response = error(&BeaconError::NotFound("Session not found".into()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = error(&BeaconError::BadRequest("Session has expired".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error(&BeaconError::CircuitOpen("unavailable".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let err = BeaconError::Database("connection string with secrets".into());
        let message = match &err {
            BeaconError::Database(_) | BeaconError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => strip_prefix(other),
        };
        assert_eq!(message, "Internal server error");
    }

    #[test]
    fn test_prefix_stripped() {
        assert_eq!(
            strip_prefix(&BeaconError::BadRequest("Session has expired".into())),
            "Session has expired"
        );
    }
}
