//! Bearer token handling
//!
//! Extracts tokens from the Authorization header and validates them as
//! HS256 JWTs. The raw token never reaches logs or storage; callers that
//! need a key derive it with `cache::token_session::hash_token`.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{BeaconError, Result};

/// Claims carried by a bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity-provider subject
    pub sub: String,

    #[serde(default)]
    pub email: String,

    /// Owning tenant; absent when the provider issued an access token
    /// without custom attributes
    #[serde(default)]
    pub tenant_id: Option<Uuid>,

    /// Tenant role; same caveat as `tenant_id`
    #[serde(default)]
    pub role: Option<String>,

    /// Expiry, seconds since epoch
    pub exp: u64,
}

impl Claims {
    /// Seconds until expiry, zero when already expired
    pub fn residual_secs(&self, now_secs: u64) -> u64 {
        self.exp.saturating_sub(now_secs)
    }
}

/// Extract the bearer token from an Authorization header value
pub fn extract_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Validator for HS256 bearer tokens
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 30;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate a token and return its claims
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|_| BeaconError::Unauthorized("Invalid token".into()))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) fn issue_test_token(secret: &str, claims: &Claims) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn claims(exp_offset: i64) -> Claims {
        Claims {
            sub: "subject-1".to_string(),
            email: "s1@example.com".to_string(),
            tenant_id: Some(Uuid::new_v4()),
            role: Some("member".to_string()),
            exp: (now_secs() as i64 + exp_offset) as u64,
        }
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("abc"), Some("abc"));
        assert_eq!(extract_bearer(""), None);
        assert_eq!(extract_bearer("Bearer "), None);
    }

    #[test]
    fn test_validate_roundtrip() {
        let validator = TokenValidator::new("secret");
        let claims = claims(3600);
        let token = issue_test_token("secret", &claims);

        let parsed = validator.validate(&token).unwrap();
        assert_eq!(parsed.sub, claims.sub);
        assert_eq!(parsed.tenant_id, claims.tenant_id);
        assert_eq!(parsed.role, claims.role);
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let validator = TokenValidator::new("secret");
        let token = issue_test_token("other-secret", &claims(3600));
        assert!(matches!(
            validator.validate(&token),
            Err(BeaconError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_rejects_expired() {
        let validator = TokenValidator::new("secret");
        let token = issue_test_token("secret", &claims(-3600));
        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn test_residual_secs() {
        let c = claims(100);
        assert!(c.residual_secs(now_secs()) <= 100);
        assert_eq!(c.residual_secs(c.exp + 10), 0);
    }
}
