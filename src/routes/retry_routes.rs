//! Retry observability
//!
//! GET /retry/stats reports dead-letter counts by status alongside the
//! retry configuration and producer metrics.

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde_json::json;
use std::sync::Arc;

use super::respond::{error, ok};
use crate::server::AppState;

/// Handle GET /retry/stats
pub async fn handle_retry_stats(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let stats = match state.dead_letters.stats().await {
        Ok(s) => s,
        Err(e) => return error(&e),
    };

    let config = &state.retry_config;
    ok(
        "Retry statistics",
        json!({
            "retry_stats": stats,
            "config": {
                "max_retries": config.max_retries,
                "batch_size": config.batch_size,
                "check_interval": format!("{}s", config.check_interval.as_secs()),
            },
            "producer": state.producer.metrics(),
        }),
    )
}
