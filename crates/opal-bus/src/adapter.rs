//! App adapters
//!
//! An adapter binds one app's contract actions to a backing system.
//! The bus resolves adapters through [`AdapterRegistry`]; when no adapter
//! is bound (or the registry runs in demo mode) the built-in
//! [`MockAdapter`] answers instead, so every contract action is invocable
//! end to end without real integrations.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;

use crate::error::AdapterError;
use crate::types::{CommandContext, CommandResult};

/// Executes contract actions against a backing system
#[async_trait]
pub trait AppAdapter: Send + Sync {
    /// Execute one action
    ///
    /// # Errors
    /// Any [`AdapterError`]; the bus converts it into a failed result.
    async fn execute(
        &self,
        app_id: &str,
        action_id: &str,
        params: &serde_json::Value,
        context: &CommandContext,
    ) -> Result<CommandResult, AdapterError>;
}

/// Registry binding app ids to adapters
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn AppAdapter>>,
    mock: Arc<MockAdapter>,
    demo_mode: bool,
}

impl AdapterRegistry {
    /// New registry; in demo mode the mock answers for every app
    #[must_use]
    pub fn new(demo_mode: bool) -> Self {
        Self {
            adapters: DashMap::new(),
            mock: Arc::new(MockAdapter::new()),
            demo_mode,
        }
    }

    /// Bind an adapter to an app id, overwriting any previous binding
    pub fn bind(&self, app_id: impl Into<String>, adapter: Arc<dyn AppAdapter>) {
        self.adapters.insert(app_id.into(), adapter);
    }

    /// Resolve the adapter for an app
    ///
    /// Demo mode always yields the mock. Otherwise the bound adapter is
    /// returned, falling back to the mock when nothing is bound.
    #[must_use]
    pub fn resolve(&self, app_id: &str) -> Arc<dyn AppAdapter> {
        if self.demo_mode {
            return self.mock.clone();
        }
        match self.adapters.get(app_id) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                tracing::debug!(app_id, "no adapter bound, using mock");
                self.mock.clone()
            }
        }
    }

    /// Whether a real adapter is bound for the app
    #[inline]
    #[must_use]
    pub fn is_bound(&self, app_id: &str) -> bool {
        self.adapters.contains_key(app_id)
    }

    /// Number of bound adapters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Check if no adapters are bound
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("bound", &self.adapters.len())
            .field("demo_mode", &self.demo_mode)
            .finish()
    }
}

/// Canned adapter that acknowledges every action
///
/// Echoes the submitted parameters back under `echo` together with a
/// fresh receipt id, so demo flows and tests can assert on payloads.
#[derive(Debug, Default)]
pub struct MockAdapter;

impl MockAdapter {
    /// New mock adapter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AppAdapter for MockAdapter {
    async fn execute(
        &self,
        app_id: &str,
        action_id: &str,
        params: &serde_json::Value,
        context: &CommandContext,
    ) -> Result<CommandResult, AdapterError> {
        tracing::debug!(app_id, action_id, user_id = %context.user_id, "mock execution");
        Ok(CommandResult::ok(json!({
            "receipt": uuid::Uuid::new_v4().to_string(),
            "app_id": app_id,
            "action_id": action_id,
            "echo": params,
        })))
    }
}
