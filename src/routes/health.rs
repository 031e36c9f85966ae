//! Health check endpoints
//!
//! - /health - liveness probe: 200 while the process runs
//! - /ready  - readiness probe: 200 once storage and bus are wired
//! - /version - build information for deployment verification

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::respond::json_response;
use crate::server::AppState;

/// Health response body
#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub node_id: String,
    pub timestamp: String,
    /// Identity-provider circuit state
    pub identity_circuit: &'static str,
    /// External sink connection status
    pub third_party: crate::delivery::DeliveryStatus,
    /// Producer pool metrics
    pub producer: crate::producer::ProducerMetrics,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        service: "beacon",
        version: env!("CARGO_PKG_VERSION"),
        node_id: state.args.node_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        identity_circuit: state.auth.identity().circuit_state().as_str(),
        third_party: state.delivery.status(),
        producer: state.producer.metrics(),
    }
}

/// Handle liveness probe (/health)
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state);
    json_response(
        StatusCode::OK,
        serde_json::to_value(&response).unwrap_or_default(),
    )
}

/// Handle readiness probe (/ready)
///
/// Storage and bus handles exist only after a successful startup, so a
/// running server is ready; the probe reports 503 only while shutdown is
/// draining.
pub fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state);
    let status = if state.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    json_response(status, serde_json::to_value(&response).unwrap_or_default())
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "beacon",
    };

    json_response(
        StatusCode::OK,
        serde_json::to_value(&response).unwrap_or_default(),
    )
}
