//! Authentication and authorization
//!
//! Provides:
//! - Bearer token validation (HS256) and token hashing
//! - Token session cache with revocation tombstones
//! - Circuit breaker around the external identity provider
//! - The per-request authentication entry point used by protected routes

pub mod circuit;
pub mod identity;
pub mod token;

pub use circuit::{CircuitBreaker, CircuitRejection, CircuitState};
pub use identity::{AuthTokens, IdentityClient, SubjectAttributes};
pub use token::{extract_bearer, Claims, TokenValidator};

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::cache::{TokenSessionStore, UserProfile};
use crate::db::schemas::UserRole;
use crate::types::{BeaconError, Result};

/// Longest a parsed token context is cached before revalidation
const CONTEXT_CACHE_MAX: Duration = Duration::from_secs(3600);

/// Authenticated request context
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub email: String,
    pub tenant_id: Uuid,
    pub role: UserRole,
}

impl AuthContext {
    fn from_profile(profile: &UserProfile) -> Self {
        Self {
            subject: profile.subject.clone(),
            email: profile.email.clone(),
            tenant_id: profile.tenant_id,
            role: UserRole::from_str(&profile.role).unwrap_or_default(),
        }
    }
}

/// Resolves bearer tokens to authenticated contexts
pub struct Authenticator {
    validator: TokenValidator,
    pub sessions: TokenSessionStore,
    identity: Arc<IdentityClient>,
}

impl Authenticator {
    pub fn new(jwt_secret: &str, identity: Arc<IdentityClient>) -> Self {
        Self {
            validator: TokenValidator::new(jwt_secret),
            sessions: TokenSessionStore::new(),
            identity,
        }
    }

    /// Authenticate a bearer token.
    ///
    /// Order matters: the revocation tombstone is consulted before anything
    /// else so a logged-out token stays dead even though its JWT would still
    /// validate. A token-session hit short-circuits JWT work entirely; on a
    /// miss the claims are validated and, when the provider issued a token
    /// without tenant attributes, resolved through the identity client.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthContext> {
        let header = authorization
            .ok_or_else(|| BeaconError::Unauthorized("Authorization token required".into()))?;
        let token = extract_bearer(header)
            .ok_or_else(|| BeaconError::Unauthorized("Authorization token required".into()))?;

        if self.sessions.is_revoked(token) {
            return Err(BeaconError::Unauthorized("Session revoked".into()));
        }

        if let Some(session) = self.sessions.get(token) {
            return Ok(AuthContext::from_profile(&session.profile));
        }

        let claims = self.validator.validate(token)?;

        let profile = match (claims.tenant_id, claims.role.as_deref()) {
            (Some(tenant_id), role) => UserProfile {
                subject: claims.sub.clone(),
                email: claims.email.clone(),
                tenant_id,
                role: role.unwrap_or("member").to_string(),
            },
            // Access token without custom attributes: the provider is the
            // source of truth for tenant membership
            (None, _) => {
                let attrs = self.identity.lookup_attributes(&claims.sub).await?;
                UserProfile {
                    subject: attrs.subject,
                    email: if attrs.email.is_empty() {
                        claims.email.clone()
                    } else {
                        attrs.email
                    },
                    tenant_id: attrs.tenant_id,
                    role: attrs.role,
                }
            }
        };

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let residual = Duration::from_secs(claims.residual_secs(now));
        let ttl = residual.min(CONTEXT_CACHE_MAX);
        let session = self.sessions.create(token, profile, ttl);

        Ok(AuthContext::from_profile(&session.profile))
    }

    /// Create a token session for a freshly minted token (login)
    pub fn establish_session(
        &self,
        token: &str,
        profile: UserProfile,
        ttl: Duration,
    ) -> crate::cache::TokenSession {
        self.sessions.create(token, profile, ttl)
    }

    /// Revoke the session behind a bearer token (logout). Idempotent.
    pub fn revoke(&self, authorization: Option<&str>) -> Result<()> {
        let token = authorization
            .and_then(extract_bearer)
            .ok_or_else(|| BeaconError::Unauthorized("No active session found".into()))?;

        // Tombstone lifetime: the token's residual validity when readable,
        // otherwise the context-cache ceiling.
        let residual = self
            .validator
            .validate(token)
            .ok()
            .map(|claims| {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                Duration::from_secs(claims.residual_secs(now))
            })
            .unwrap_or(CONTEXT_CACHE_MAX);

        self.sessions.revoke(token, residual);
        Ok(())
    }

    /// Identity client handle (login route, health surface)
    pub fn identity(&self) -> &IdentityClient {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityArgs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn authenticator() -> Authenticator {
        let identity = Arc::new(
            IdentityClient::new(&IdentityArgs {
                identity_region: "us-east-1".into(),
                identity_user_pool_id: Some("pool-1".into()),
                identity_endpoint: Some("http://127.0.0.1:1".into()),
            })
            .unwrap(),
        );
        Authenticator::new("secret", identity)
    }

    fn token_for(subject: &str, tenant_id: Uuid) -> String {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600;
        token::issue_test_token(
            "secret",
            &Claims {
                sub: subject.to_string(),
                email: format!("{}@example.com", subject),
                tenant_id: Some(tenant_id),
                role: Some("member".to_string()),
                exp,
            },
        )
    }

    #[tokio::test]
    async fn test_authenticate_with_tenant_claims() {
        let auth = authenticator();
        let tenant = Uuid::new_v4();
        let token = token_for("s1", tenant);

        let ctx = auth
            .authenticate(Some(&format!("Bearer {}", token)))
            .await
            .unwrap();
        assert_eq!(ctx.subject, "s1");
        assert_eq!(ctx.tenant_id, tenant);
        assert_eq!(ctx.role, UserRole::Member);

        // Second call is served from the token-session cache
        let ctx2 = auth
            .authenticate(Some(&format!("Bearer {}", token)))
            .await
            .unwrap();
        assert_eq!(ctx2.tenant_id, tenant);
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let auth = authenticator();
        assert!(matches!(
            auth.authenticate(None).await,
            Err(BeaconError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let auth = authenticator();
        assert!(matches!(
            auth.authenticate(Some("Bearer not-a-jwt")).await,
            Err(BeaconError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_sticks() {
        let auth = authenticator();
        let token = token_for("s1", Uuid::new_v4());
        let header = format!("Bearer {}", token);

        auth.authenticate(Some(&header)).await.unwrap();
        auth.revoke(Some(&header)).unwrap();
        auth.revoke(Some(&header)).unwrap();

        // Any request bearing the revoked token fails even though the JWT
        // itself is still valid
        assert!(matches!(
            auth.authenticate(Some(&header)).await,
            Err(BeaconError::Unauthorized(_))
        ));
    }
}
