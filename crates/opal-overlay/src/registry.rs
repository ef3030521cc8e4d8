//! Overlay registry

use crate::error::OverlayError;
use crate::session::Role;
use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Rendered output of one overlay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySurface {
    /// Window title
    pub title: String,
    /// Structured body content
    pub body: Value,
}

impl OverlaySurface {
    /// Surface with a title and empty body
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: Value::Null,
        }
    }

    /// With body content
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

/// A loadable overlay app
pub trait OverlayComponent: Send + Sync {
    /// Render the overlay with its params
    fn render(&self, params: &IndexMap<String, String>) -> OverlaySurface;
}

/// Async component factory, called when the overlay first opens
pub type OverlayLoader = Arc<
    dyn Fn() -> BoxFuture<'static, Result<Box<dyn OverlayComponent>, OverlayError>> + Send + Sync,
>;

/// One registered overlay
#[derive(Clone)]
pub struct OverlayConfig {
    /// Stable key (also the `app` param value)
    pub key: String,
    /// Window title
    pub title: String,
    /// Minimum role allowed in
    pub required_role: Role,
    /// Whether a signed-in user is required
    pub requires_auth: bool,
    /// Canonical routes; the first is the base route
    pub routes: Vec<String>,
    loader: OverlayLoader,
}

impl OverlayConfig {
    /// Config with a loader; open to guests by default
    #[must_use]
    pub fn new(key: impl Into<String>, title: impl Into<String>, loader: OverlayLoader) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            required_role: Role::Guest,
            requires_auth: false,
            routes: Vec::new(),
            loader,
        }
    }

    /// With a minimum role
    #[inline]
    #[must_use]
    pub fn with_required_role(mut self, role: Role) -> Self {
        self.required_role = role;
        self
    }

    /// Requiring a signed-in user
    #[inline]
    #[must_use]
    pub fn with_auth_required(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// With canonical routes
    #[must_use]
    pub fn with_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes = routes.into_iter().map(Into::into).collect();
        self
    }

    /// Base route, when one is declared
    #[must_use]
    pub fn base_route(&self) -> Option<&str> {
        self.routes.first().map(String::as_str)
    }

    /// Run the loader
    ///
    /// # Errors
    ///
    /// Returns the loader's [`OverlayError`] when it fails.
    pub async fn load(&self) -> Result<Box<dyn OverlayComponent>, OverlayError> {
        (self.loader)().await
    }
}

impl std::fmt::Debug for OverlayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayConfig")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("required_role", &self.required_role)
            .field("requires_auth", &self.requires_auth)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// Registered overlay configs
#[derive(Default)]
pub struct OverlayRegistry {
    overlays: DashMap<String, Arc<OverlayConfig>>,
}

impl OverlayRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a config, replacing any previous one with the same key
    pub fn register(&self, config: OverlayConfig) {
        tracing::debug!(key = %config.key, "overlay registered");
        self.overlays.insert(config.key.clone(), Arc::new(config));
    }

    /// Config for a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<OverlayConfig>> {
        self.overlays.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether a key is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.overlays.contains_key(key)
    }

    /// Registered keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.overlays.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Config whose route prefix matches the given path
    #[must_use]
    pub fn match_route(&self, path: &str) -> Option<Arc<OverlayConfig>> {
        self.overlays
            .iter()
            .find(|entry| {
                entry.value().routes.iter().any(|route| {
                    let base = route.split(':').next().unwrap_or(route);
                    let base = base.trim_end_matches('/');
                    !base.is_empty() && (path == base || path.starts_with(&format!("{base}/")))
                })
            })
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered overlays
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    /// Whether the registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}

impl std::fmt::Debug for OverlayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRegistry")
            .field("overlays", &self.overlays.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub;

    impl OverlayComponent for Stub {
        fn render(&self, _params: &IndexMap<String, String>) -> OverlaySurface {
            OverlaySurface::new("stub")
        }
    }

    fn stub_loader() -> OverlayLoader {
        Arc::new(|| Box::pin(async { Ok(Box::new(Stub) as Box<dyn OverlayComponent>) }))
    }

    #[test]
    fn register_and_lookup() {
        let registry = OverlayRegistry::new();
        registry.register(OverlayConfig::new("cart", "Cart", stub_loader()));

        assert!(registry.contains("cart"));
        assert_eq!(registry.get("cart").unwrap().title, "Cart");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn match_route_by_prefix() {
        let registry = OverlayRegistry::new();
        registry.register(
            OverlayConfig::new("profile", "Profile", stub_loader())
                .with_routes(["/profile/:id", "/profile"]),
        );
        registry.register(
            OverlayConfig::new("cart", "Cart", stub_loader()).with_routes(["/cart"]),
        );

        assert_eq!(registry.match_route("/cart").unwrap().key, "cart");
        assert_eq!(registry.match_route("/profile/u-9").unwrap().key, "profile");
        assert!(registry.match_route("/settings").is_none());
    }

    #[test]
    fn base_route_is_first_declared() {
        let config = OverlayConfig::new("events", "Events", stub_loader())
            .with_routes(["/events", "/events/:id"]);
        assert_eq!(config.base_route(), Some("/events"));
    }
}
