//! Bearer token sessions
//!
//! Keyed by the SHA-256 of the access token; the raw token is never stored,
//! logged, or embedded in errors. Revocation leaves a tombstone for the
//! token's residual lifetime so a revoked token keeps failing authentication
//! even though its JWT would still validate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::store::TtlStore;

/// Authenticated profile carried by a token session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub subject: String,
    pub email: String,
    pub tenant_id: Uuid,
    pub role: String,
}

/// Cache-resident record of a logged-in bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSession {
    pub profile: UserProfile,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenSession {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Entry stored per token hash
#[derive(Debug, Clone)]
enum TokenEntry {
    Live(TokenSession),
    Revoked,
}

/// Store of token sessions and revocation tombstones
pub struct TokenSessionStore {
    store: Arc<TtlStore<TokenEntry>>,
}

/// SHA-256 hex digest of a bearer token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn cache_key(token_hash: &str) -> String {
    format!("token:session:{}", token_hash)
}

impl TokenSessionStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(TtlStore::new("token-session")),
        }
    }

    /// Create a session for a freshly authenticated token
    pub fn create(&self, token: &str, profile: UserProfile, ttl: Duration) -> TokenSession {
        let now = Utc::now();
        let session = TokenSession {
            profile,
            session_id: Uuid::new_v4(),
            created_at: now,
            last_used_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
        };

        self.store.put(
            &cache_key(&hash_token(token)),
            TokenEntry::Live(session.clone()),
            ttl,
        );

        session
    }

    /// Whether the token has been revoked
    pub fn is_revoked(&self, token: &str) -> bool {
        matches!(
            self.store.get(&cache_key(&hash_token(token))),
            Some(TokenEntry::Revoked)
        )
    }

    /// Look up a live session, refreshing its last-used timestamp
    pub fn get(&self, token: &str) -> Option<TokenSession> {
        let key = cache_key(&hash_token(token));
        match self.store.get(&key)? {
            TokenEntry::Revoked => None,
            TokenEntry::Live(mut session) => {
                if session.is_expired() {
                    self.store.invalidate(&key);
                    return None;
                }
                session.last_used_at = Utc::now();
                let ttl = (session.expires_at - Utc::now()).to_std().ok()?;
                self.store.put(&key, TokenEntry::Live(session.clone()), ttl);
                Some(session)
            }
        }
    }

    /// Revoke a token, leaving a tombstone covering its residual lifetime.
    /// Idempotent: revoking an unknown or already-revoked token is a no-op
    /// that still records the tombstone.
    pub fn revoke(&self, token: &str, residual: Duration) {
        self.store
            .put(&cache_key(&hash_token(token)), TokenEntry::Revoked, residual);
    }

    /// Revoke every live session belonging to a subject. Full-store scan;
    /// acceptable at in-process scale.
    pub fn revoke_all_for_subject(&self, subject: &str) -> usize {
        let mut keys = Vec::new();
        self.store.for_each_live(|key, entry| {
            if let TokenEntry::Live(session) = entry {
                if session.profile.subject == subject {
                    keys.push((key.to_string(), session.expires_at));
                }
            }
        });

        let revoked = keys.len();
        let now = Utc::now();
        for (key, expires_at) in keys {
            let residual = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
            self.store.put(&key, TokenEntry::Revoked, residual);
        }
        revoked
    }

    /// Start the periodic reaper for expired sessions and tombstones
    pub fn spawn_cleanup(&self) {
        super::store::spawn_cleanup_task(Arc::clone(&self.store));
    }
}

impl Default for TokenSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(subject: &str) -> UserProfile {
        UserProfile {
            subject: subject.to_string(),
            email: format!("{}@example.com", subject),
            tenant_id: Uuid::new_v4(),
            role: "member".to_string(),
        }
    }

    #[test]
    fn test_hash_is_stable_and_opaque() {
        let token = "bearer-token-value";
        let hash = hash_token(token);
        assert_eq!(hash, hash_token(token));
        assert_eq!(hash.len(), 64);
        assert!(!hash.contains(token));
    }

    #[test]
    fn test_create_then_get() {
        let store = TokenSessionStore::new();
        let created = store.create("tok", profile("s1"), Duration::from_secs(3600));
        let fetched = store.get("tok").expect("live session");
        assert_eq!(fetched.session_id, created.session_id);
        assert_eq!(fetched.profile.subject, "s1");
        assert!(fetched.last_used_at >= created.last_used_at);
    }

    #[test]
    fn test_revoked_token_stays_dead() {
        let store = TokenSessionStore::new();
        store.create("tok", profile("s1"), Duration::from_secs(3600));
        store.revoke("tok", Duration::from_secs(3600));

        assert!(store.is_revoked("tok"));
        assert!(store.get("tok").is_none());

        // Idempotent
        store.revoke("tok", Duration::from_secs(3600));
        assert!(store.is_revoked("tok"));
    }

    #[test]
    fn test_revoke_unknown_token_leaves_tombstone() {
        let store = TokenSessionStore::new();
        store.revoke("never-seen", Duration::from_secs(60));
        assert!(store.is_revoked("never-seen"));
    }

    #[test]
    fn test_revoke_all_for_subject() {
        let store = TokenSessionStore::new();
        store.create("tok-a", profile("s1"), Duration::from_secs(3600));
        store.create("tok-b", profile("s1"), Duration::from_secs(3600));
        store.create("tok-c", profile("s2"), Duration::from_secs(3600));

        assert_eq!(store.revoke_all_for_subject("s1"), 2);
        assert!(store.get("tok-a").is_none());
        assert!(store.get("tok-b").is_none());
        assert!(store.get("tok-c").is_some());
    }
}
