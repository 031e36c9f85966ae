//! Active-session cache
//!
//! Keeps the ingestion fast path off the database for the common case. A
//! cached session is a hint only: the ingest path re-verifies tenant and
//! subject against the request context before acting, and any mismatch is
//! treated as a miss with fall-through to storage.

use chrono::Utc;
use std::sync::Arc;

use super::store::TtlStore;
use crate::db::schemas::TrackingSessionDoc;
use uuid::Uuid;

/// Cache of active tracking sessions, keyed by session id
pub struct SessionCache {
    store: Arc<TtlStore<TrackingSessionDoc>>,
}

fn cache_key(session_id: Uuid) -> String {
    format!("session:active:{}", session_id)
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            store: Arc::new(TtlStore::new("session")),
        }
    }

    /// Cache a session for its remaining wall-clock lifetime. Sessions with
    /// no lifetime left are not cached.
    pub fn put(&self, session: &TrackingSessionDoc) {
        if let Some(ttl) = session.remaining(Utc::now()) {
            self.store.put(&cache_key(session.id), session.clone(), ttl);
        }
    }

    /// Look up a session. A miss is not an error.
    pub fn get(&self, session_id: Uuid) -> Option<TrackingSessionDoc> {
        self.store.get(&cache_key(session_id))
    }

    /// Drop a session from the cache. Idempotent.
    pub fn invalidate(&self, session_id: Uuid) {
        self.store.invalidate(&cache_key(session_id));
    }

    /// Start the periodic reaper for expired entries
    pub fn spawn_cleanup(&self) {
        super::store::spawn_cleanup_task(Arc::clone(&self.store));
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_invalidate() {
        let cache = SessionCache::new();
        let session = TrackingSessionDoc::new(Uuid::new_v4(), "subject-1", 600);
        cache.put(&session);

        let cached = cache.get(session.id).expect("cached session");
        assert_eq!(cached.id, session.id);
        assert_eq!(cached.subject, "subject-1");

        cache.invalidate(session.id);
        assert!(cache.get(session.id).is_none());
        // invalidate is idempotent
        cache.invalidate(session.id);
    }

    #[test]
    fn test_lapsed_session_not_cached() {
        let cache = SessionCache::new();
        let mut session = TrackingSessionDoc::new(Uuid::new_v4(), "s", 600);
        session.started_at =
            bson::DateTime::from_chrono(Utc::now() - chrono::Duration::seconds(700));
        cache.put(&session);
        assert!(cache.get(session.id).is_none());
    }

    #[test]
    fn test_miss_for_unknown_id() {
        let cache = SessionCache::new();
        assert!(cache.get(Uuid::new_v4()).is_none());
    }
}
