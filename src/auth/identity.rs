//! External identity provider client
//!
//! Token minting and user attributes live with the provider; this client
//! covers the two calls the gateway needs: credential authentication at
//! login and attribute lookup for tokens issued without tenant claims.
//! Every call runs under the circuit breaker: a broken provider surfaces
//! as 503, never as a hung request.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use super::circuit::CircuitBreaker;
use crate::config::IdentityArgs;
use crate::types::{BeaconError, Result};

/// Identity provider request timeout
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Successful authentication result
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
}

/// User attributes held by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectAttributes {
    pub subject: String,
    #[serde(default)]
    pub email: String,
    pub tenant_id: Uuid,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "member".to_string()
}

#[derive(Debug, Serialize)]
struct AuthenticateRequest<'a> {
    user_pool_id: &'a str,
    username: &'a str,
    password: &'a str,
}

/// HTTP client for the external identity provider
pub struct IdentityClient {
    endpoint: String,
    user_pool_id: String,
    http: reqwest::Client,
    breaker: CircuitBreaker,
}

impl IdentityClient {
    pub fn new(args: &IdentityArgs) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| BeaconError::Config(format!("identity client: {}", e)))?;

        Ok(Self {
            endpoint: args.endpoint(),
            user_pool_id: args.identity_user_pool_id.clone().unwrap_or_default(),
            http,
            breaker: CircuitBreaker::for_identity_provider(),
        })
    }

    /// Current breaker state, for the health surface
    pub fn circuit_state(&self) -> super::circuit::CircuitState {
        self.breaker.state()
    }

    /// Authenticate credentials with the provider
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<AuthTokens> {
        let url = format!("{}/authenticate", self.endpoint);
        let body = AuthenticateRequest {
            user_pool_id: &self.user_pool_id,
            username,
            password,
        };

        let outcome = self
            .breaker
            .call(|| async {
                let response = self.http.post(&url).json(&body).send().await?;
                if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                    // A rejected credential is a provider answer, not an outage
                    return Ok(None);
                }
                let response = response.error_for_status()?;
                let tokens = response.json::<AuthTokens>().await?;
                Ok::<_, reqwest::Error>(Some(tokens))
            })
            .await
            .map_err(|_| {
                BeaconError::CircuitOpen("identity provider temporarily unavailable".into())
            })?;

        match outcome {
            Ok(Some(tokens)) => Ok(tokens),
            Ok(None) => Err(BeaconError::Unauthorized("Invalid credentials".into())),
            Err(e) => {
                warn!("Identity provider authentication failed: {}", e);
                Err(BeaconError::Unauthorized("Invalid credentials".into()))
            }
        }
    }

    /// Look up attributes for a subject whose token lacked tenant claims
    pub async fn lookup_attributes(&self, subject: &str) -> Result<SubjectAttributes> {
        let url = format!(
            "{}/pools/{}/subjects/{}",
            self.endpoint, self.user_pool_id, subject
        );

        let outcome = self
            .breaker
            .call(|| async {
                let response = self.http.get(&url).send().await?.error_for_status()?;
                response.json::<SubjectAttributes>().await
            })
            .await
            .map_err(|_| {
                BeaconError::CircuitOpen("identity provider temporarily unavailable".into())
            })?;

        outcome.map_err(|e| {
            warn!("Identity provider lookup failed for subject: {}", e);
            BeaconError::Unauthorized("Unknown subject".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_deserialization_defaults() {
        let json = format!(
            r#"{{"subject":"s1","tenant_id":"{}"}}"#,
            Uuid::new_v4()
        );
        let attrs: SubjectAttributes = serde_json::from_str(&json).unwrap();
        assert_eq!(attrs.role, "member");
        assert_eq!(attrs.email, "");
    }
}
