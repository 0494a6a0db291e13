//! Per-user LTM cache

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use speech_coach_core::LongTermMemory;

#[derive(Debug, Clone)]
struct CacheEntry {
    ltm: LongTermMemory,
    expires_at: DateTime<Utc>,
    valid: bool,
}

impl CacheEntry {
    fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.valid && self.expires_at > now
    }
}

/// LTM cache keyed by user id
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone)]
pub struct LtmCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    window: Duration,
}

impl LtmCache {
    pub fn new(window_hours: i64) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            window: Duration::hours(window_hours),
        }
    }

    /// Cached LTM if it is still inside its window
    pub fn get_fresh(&self, user_id: &str) -> Option<LongTermMemory> {
        self.get_fresh_at(user_id, Utc::now())
    }

    pub fn get_fresh_at(&self, user_id: &str, now: DateTime<Utc>) -> Option<LongTermMemory> {
        self.entries
            .get(user_id)
            .filter(|entry| entry.is_fresh_at(now))
            .map(|entry| entry.ltm.clone())
    }

    /// Store after a (re)load; resets the window
    pub fn put(&self, ltm: LongTermMemory) {
        let expires_at = Utc::now() + self.window;
        tracing::debug!(user_id = %ltm.user_id, %expires_at, "Caching LTM");
        self.entries.insert(
            ltm.user_id.clone(),
            CacheEntry {
                ltm,
                expires_at,
                valid: true,
            },
        );
    }

    /// Mark a user's entry stale without dropping it
    pub fn invalidate(&self, user_id: &str) {
        if let Some(mut entry) = self.entries.get_mut(user_id) {
            entry.valid = false;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LtmCache {
    fn default() -> Self {
        Self::new(24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_within_window() {
        let cache = LtmCache::default();
        cache.put(LongTermMemory::new("u1"));
        assert!(cache.get_fresh("u1").is_some());
        assert!(cache.get_fresh("u2").is_none());
    }

    #[test]
    fn test_stale_after_window() {
        let cache = LtmCache::default();
        cache.put(LongTermMemory::new("u1"));
        let later = Utc::now() + Duration::hours(25);
        assert!(cache.get_fresh_at("u1", later).is_none());
    }

    #[test]
    fn test_invalidate() {
        let cache = LtmCache::default();
        cache.put(LongTermMemory::new("u1"));
        cache.invalidate("u1");
        assert!(cache.get_fresh("u1").is_none());
        assert_eq!(cache.len(), 1);

        cache.put(LongTermMemory::new("u1"));
        assert!(cache.get_fresh("u1").is_some());
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = LtmCache::new(1);
        let other = cache.clone();
        other.put(LongTermMemory::new("u1"));
        assert!(cache.get_fresh("u1").is_some());
    }
}
