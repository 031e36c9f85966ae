//! Generic in-process TTL key-value store
//!
//! Concurrent map of key -> (value, expiry). Reads never block writers;
//! expired entries are invisible to readers and reaped by a background
//! cleanup task.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Stored entry with absolute expiry
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// TTL key-value store with concurrent access
pub struct TtlStore<V> {
    entries: DashMap<String, Entry<V>>,
    /// Name used in cleanup logging
    name: &'static str,
}

impl<V: Clone> TtlStore<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            entries: DashMap::new(),
            name,
        }
    }

    /// Store a value, overwriting any previous entry. Callers clamp TTLs;
    /// a zero TTL inserts an already-expired entry.
    pub fn put(&self, key: &str, value: V, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Look up a value. A miss (absent or expired) is not an error.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Remove an entry. Idempotent.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Visit live entries (used for administrative scans)
    pub fn for_each_live<F: FnMut(&str, &V)>(&self, mut f: F) {
        let now = Instant::now();
        for entry in self.entries.iter() {
            if entry.expires_at > now {
                f(entry.key(), &entry.value);
            }
        }
    }

    /// Remove expired entries, returning how many were reaped
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    /// Number of entries currently held (including not-yet-reaped expired ones)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Spawn a background task that reaps expired entries every minute
pub fn spawn_cleanup_task<V: Clone + Send + Sync + 'static>(store: Arc<TtlStore<V>>) {
    let name = store.name;
    tokio::spawn(async move {
        let interval = Duration::from_secs(60);
        loop {
            tokio::time::sleep(interval).await;
            let removed = store.cleanup();
            if removed > 0 {
                debug!("{} cache cleanup: removed {} expired entries", name, removed);
            }
        }
    });
    info!("{} cache cleanup task started", name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let store = TtlStore::new("test");
        store.put("k", 42u32, Duration::from_secs(60));
        assert_eq!(store.get("k"), Some(42));
    }

    #[test]
    fn test_miss_is_none() {
        let store: TtlStore<u32> = TtlStore::new("test");
        assert_eq!(store.get("absent"), None);
    }

    #[test]
    fn test_expired_entry_is_miss() {
        let store = TtlStore::new("test");
        store.put("k", 1u32, Duration::ZERO);
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_put_overwrites() {
        let store = TtlStore::new("test");
        store.put("k", 1u32, Duration::from_secs(60));
        store.put("k", 2u32, Duration::from_secs(60));
        assert_eq!(store.get("k"), Some(2));
    }

    #[test]
    fn test_invalidate_idempotent() {
        let store = TtlStore::new("test");
        store.put("k", 1u32, Duration::from_secs(60));
        store.invalidate("k");
        store.invalidate("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_cleanup_reaps_expired_only() {
        let store = TtlStore::new("test");
        store.put("live", 1u32, Duration::from_secs(60));
        store.put("dead", 2u32, Duration::ZERO);
        let removed = store.cleanup();
        assert_eq!(removed, 1);
        assert_eq!(store.get("live"), Some(1));
        assert_eq!(store.len(), 1);
    }
}
