//! Configuration for Beacon
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// Beacon - multi-tenant location ingestion gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "beacon")]
#[command(about = "Multi-tenant real-time location ingestion gateway")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "beacon")]
    pub mongodb_db: String,

    /// Message bus configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Base URL of the external analytics sink
    #[arg(long, env = "THIRD_PARTY_ENDPOINT", default_value = "http://httpbin.org/post")]
    pub third_party_endpoint: String,

    /// Identity provider configuration
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// JWT secret for bearer token validation (HS256)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Number of producer pool workers
    #[arg(long, env = "WORKER_COUNT", default_value = "10")]
    pub worker_count: usize,

    /// Producer event queue capacity (events beyond this are dropped)
    #[arg(long, env = "EVENT_QUEUE_SIZE", default_value = "1000")]
    pub event_queue_size: usize,

    /// Maximum delivery retries before a dead letter is permanently failed
    #[arg(long, env = "MAX_RETRIES", default_value = "8")]
    pub max_retries: i32,

    /// Maximum dead letters picked up per retry sweep
    #[arg(long, env = "RETRY_BATCH_SIZE", default_value = "100")]
    pub retry_batch_size: i64,

    /// Seconds between retry sweeps
    #[arg(long, env = "RETRY_CHECK_INTERVAL_SECS", default_value = "30")]
    pub retry_check_interval_secs: u64,

    /// Session duration in seconds when a start request omits one
    #[arg(long, env = "DEFAULT_SESSION_DURATION_SECS", default_value = "600")]
    pub default_session_duration_secs: i64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Message bus connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

/// External identity provider configuration
#[derive(Parser, Debug, Clone)]
pub struct IdentityArgs {
    /// Identity provider region
    #[arg(long, env = "IDENTITY_REGION", default_value = "us-east-1")]
    pub identity_region: String,

    /// Identity provider user pool id
    #[arg(long, env = "IDENTITY_USER_POOL_ID")]
    pub identity_user_pool_id: Option<String>,

    /// Identity provider API base URL (derived from region when unset)
    #[arg(long, env = "IDENTITY_ENDPOINT")]
    pub identity_endpoint: Option<String>,
}

impl IdentityArgs {
    /// Effective identity provider endpoint
    pub fn endpoint(&self) -> String {
        self.identity_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://identity.{}.amazonaws.com", self.identity_region))
    }
}

impl Args {
    /// Retry sweep period
    pub fn retry_check_interval(&self) -> Duration {
        Duration::from_secs(self.retry_check_interval_secs)
    }

    /// Effective JWT secret; `validate()` guarantees presence before startup
    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.as_deref().map_or(true, |s| s.is_empty()) {
            return Err("JWT_SECRET is required".to_string());
        }

        if self.worker_count == 0 {
            return Err("WORKER_COUNT must be at least 1".to_string());
        }

        if self.event_queue_size == 0 {
            return Err("EVENT_QUEUE_SIZE must be at least 1".to_string());
        }

        if self.max_retries < 1 {
            return Err("MAX_RETRIES must be at least 1".to_string());
        }

        if self.default_session_duration_secs <= 0 {
            return Err("DEFAULT_SESSION_DURATION_SECS must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["beacon", "--jwt-secret", "test-secret"])
    }

    #[test]
    fn test_defaults() {
        let args = base_args();
        assert_eq!(args.worker_count, 10);
        assert_eq!(args.event_queue_size, 1000);
        assert_eq!(args.max_retries, 8);
        assert_eq!(args.retry_batch_size, 100);
        assert_eq!(args.retry_check_interval(), Duration::from_secs(30));
        assert_eq!(args.default_session_duration_secs, 600);
    }

    #[test]
    fn test_validate_requires_jwt_secret() {
        let mut args = base_args();
        args.jwt_secret = None;
        assert!(args.validate().is_err());
        args.jwt_secret = Some("secret".into());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_identity_endpoint_derived_from_region() {
        let args = base_args();
        assert!(args.identity.endpoint().contains("us-east-1"));
    }
}
