//! Idempotency cache
//!
//! Short-lived replay protection for duplicate command submissions.
//! Entries self-expire via TTL; both success and failure results are
//! cached so a retried failure replays the same failure.

use moka::sync::Cache;
use std::time::Duration;

use crate::types::CommandResult;

/// Default replay window
pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(60);

/// TTL cache of invocation results keyed by idempotency key
#[derive(Debug, Clone)]
pub struct IdempotencyCache {
    inner: Cache<String, CommandResult>,
}

impl IdempotencyCache {
    /// New cache with the default 60 s window
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_IDEMPOTENCY_TTL)
    }

    /// New cache with a custom window
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Look up a cached result
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<CommandResult> {
        self.inner.get(key)
    }

    /// Store a result under a key
    #[inline]
    pub fn insert(&self, key: impl Into<String>, result: CommandResult) {
        self.inner.insert(key.into(), result);
    }

    /// Approximate number of live entries
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_insert_and_get() {
        let cache = IdempotencyCache::new();
        cache.insert("k1", CommandResult::ok(json!({ "id": 1 })));

        let hit = cache.get("k1").unwrap();
        assert!(hit.success);
        assert!(cache.get("k2").is_none());
    }

    #[test]
    fn cache_keeps_failures() {
        let cache = IdempotencyCache::new();
        cache.insert("k1", CommandResult::fail("broken"));

        let hit = cache.get("k1").unwrap();
        assert!(!hit.success);
        assert_eq!(hit.error.as_deref(), Some("broken"));
    }

    #[test]
    fn cache_entries_expire() {
        let cache = IdempotencyCache::with_ttl(Duration::from_millis(30));
        cache.insert("k1", CommandResult::ok(json!(null)));
        assert!(cache.get("k1").is_some());

        std::thread::sleep(Duration::from_millis(80));
        assert!(cache.get("k1").is_none());
    }
}
