//! Error types for Beacon

use hyper::StatusCode;

/// Main error type for Beacon operations
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource conflict, e.g. a subject that already has an active session
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Database error: {0}")]
    Database(String),

    /// External sink rejected or was unreachable
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Identity provider circuit breaker is open
    #[error("Identity provider unavailable: {0}")]
    CircuitOpen(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BeaconError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Bus(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Delivery(_) => StatusCode::BAD_GATEWAY,
            Self::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// From conversions for common error types

impl From<std::io::Error> for BeaconError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for BeaconError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for BeaconError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for BeaconError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<async_nats::Error> for BeaconError {
    fn from(err: async_nats::Error) -> Self {
        Self::Bus(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for BeaconError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("Token error: {}", err))
    }
}

impl From<reqwest::Error> for BeaconError {
    fn from(err: reqwest::Error) -> Self {
        Self::Delivery(err.to_string())
    }
}

/// Result type alias for Beacon operations
pub type Result<T> = std::result::Result<T, BeaconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            BeaconError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BeaconError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BeaconError::CircuitOpen("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            BeaconError::Conflict("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
