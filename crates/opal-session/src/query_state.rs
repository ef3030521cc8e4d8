//! Query state
//!
//! The session's navigation state as an ordered param map. Hosts read
//! and mutate it directly; every mutation publishes a fresh snapshot on
//! a watch channel so subscribers can react to changes they did not
//! make themselves. The query-string codec keeps the state shareable
//! (deep links) and restorable.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Active overlay app key
pub const PARAM_APP: &str = "app";
/// Comma-separated mounted feature ids
pub const PARAM_FEATURES: &str = "f";
/// Prefix for per-feature props: `fx.<feature>.<key>`
pub const FEATURE_PROP_PREFIX: &str = "fx.";
/// Where to navigate after a flow completes
pub const PARAM_RETURN_TO: &str = "return_to";
/// Diagnostics toggle
pub const PARAM_DEBUG: &str = "debug";

/// Immutable view of the params at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStateSnapshot {
    params: IndexMap<String, String>,
}

impl QueryStateSnapshot {
    /// Value of a param
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// All params in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of params
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if no params are set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Keys added, removed, or changed between `self` and `other`
    #[must_use]
    pub fn diff(&self, other: &QueryStateSnapshot) -> QueryStateDiff {
        let mut diff = QueryStateDiff::default();
        for (key, value) in &other.params {
            match self.params.get(key) {
                None => diff.added.push(key.clone()),
                Some(old) if old != value => diff.changed.push(key.clone()),
                Some(_) => {}
            }
        }
        for key in self.params.keys() {
            if !other.params.contains_key(key) {
                diff.removed.push(key.clone());
            }
        }
        diff
    }
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStateDiff {
    /// Keys present only in the newer snapshot
    pub added: Vec<String>,
    /// Keys present only in the older snapshot
    pub removed: Vec<String>,
    /// Keys present in both with different values
    pub changed: Vec<String>,
}

impl QueryStateDiff {
    /// Whether nothing differs
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Whether the given key appears anywhere in the diff
    #[must_use]
    pub fn touches(&self, key: &str) -> bool {
        self.added.iter().any(|k| k == key)
            || self.removed.iter().any(|k| k == key)
            || self.changed.iter().any(|k| k == key)
    }
}

struct Inner {
    params: RwLock<IndexMap<String, String>>,
    publisher: watch::Sender<QueryStateSnapshot>,
    syncing: AtomicBool,
}

/// Shared handle to the session's param map
///
/// Cheap to clone; all clones observe and mutate the same state.
#[derive(Clone)]
pub struct QueryState {
    inner: Arc<Inner>,
}

impl QueryState {
    /// New empty state
    #[must_use]
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(QueryStateSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                params: RwLock::new(IndexMap::new()),
                publisher,
                syncing: AtomicBool::new(false),
            }),
        }
    }

    /// Restore state from a query string
    #[must_use]
    pub fn from_query_string(query: &str) -> Self {
        let state = Self::new();
        {
            let mut params = state.inner.params.write();
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = match pair.split_once('=') {
                    Some((k, v)) => (decode(k), decode(v)),
                    None => (decode(pair), String::new()),
                };
                params.insert(key, value);
            }
        }
        state.publish();
        state
    }

    /// Value of a param
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.params.read().get(key).cloned()
    }

    /// Whether a param is set
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.params.read().contains_key(key)
    }

    /// Set a param, publishing the new snapshot
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.params.write().insert(key.into(), value.into());
        self.publish();
    }

    /// Set several params in one published update
    pub fn set_many<I, K, V>(&self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        {
            let mut params = self.inner.params.write();
            for (key, value) in pairs {
                params.insert(key.into(), value.into());
            }
        }
        self.publish();
    }

    /// Remove a param; returns the previous value
    pub fn remove(&self, key: &str) -> Option<String> {
        let removed = self.inner.params.write().shift_remove(key);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    /// Remove every param whose key starts with `prefix`
    ///
    /// Returns how many were removed.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let removed = {
            let mut params = self.inner.params.write();
            let before = params.len();
            params.retain(|key, _| !key.starts_with(prefix));
            before - params.len()
        };
        if removed > 0 {
            self.publish();
        }
        removed
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> QueryStateSnapshot {
        QueryStateSnapshot {
            params: self.inner.params.read().clone(),
        }
    }

    /// Subscribe to snapshot updates
    ///
    /// The receiver starts at the current snapshot and sees every
    /// subsequent published change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<QueryStateSnapshot> {
        self.inner.publisher.subscribe()
    }

    /// Serialize to a `k=v&k=v` query string
    ///
    /// `%`, `&`, and `=` in keys or values are percent-encoded so the
    /// string survives a round trip.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let params = self.inner.params.read();
        let mut out = String::new();
        for (i, (key, value)) in params.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(&encode(key));
            out.push('=');
            out.push_str(&encode(value));
        }
        out
    }

    /// Mark a route-sync pass as in flight
    ///
    /// While the guard lives, [`QueryState::is_syncing`] reports `true`;
    /// hosts use this to ignore the state change their own sync caused.
    #[must_use]
    pub fn begin_sync(&self) -> SyncGuard {
        self.inner.syncing.store(true, Ordering::SeqCst);
        SyncGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Whether a route-sync pass is in flight
    #[inline]
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        let _ = self.inner.publisher.send(snapshot);
    }
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryState")
            .field("params", &*self.inner.params.read())
            .field("syncing", &self.is_syncing())
            .finish()
    }
}

/// RAII flag cleared when the route-sync pass ends
pub struct SyncGuard {
    inner: Arc<Inner>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.inner.syncing.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SyncGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SyncGuard")
    }
}

fn encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            other => out.push(other),
        }
    }
    out
}

fn decode(raw: &str) -> String {
    raw.replace("%3D", "=")
        .replace("%26", "&")
        .replace("%25", "%")
}
