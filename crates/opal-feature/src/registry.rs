//! Feature registry and rollout gates

use crate::component::FeatureComponent;
use crate::error::FeatureError;
use dashmap::DashMap;
use futures::future::BoxFuture;
use opal_contract::ParamSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Async component factory
///
/// Stands in for lazy plugin loading; called once per mount.
pub type ComponentLoader = Arc<
    dyn Fn() -> BoxFuture<'static, Result<Box<dyn FeatureComponent>, FeatureError>> + Send + Sync,
>;

/// Rollout gate for one feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rollout {
    /// Enabled for everyone
    On,
    /// Disabled for everyone
    Off,
    /// Enabled for ids whose bucket falls below the percentage
    Percent(u8),
}

impl Rollout {
    /// Whether the gate admits the given feature id
    ///
    /// `Percent(p)` admits iff `rollout_bucket(id) < p`, so the same id
    /// always gets the same answer.
    #[must_use]
    pub fn admits(&self, id: &str) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Percent(p) => rollout_bucket(id) < u64::from(*p),
        }
    }
}

/// Deterministic bucket in `0..100` for a feature id
///
/// First 8 bytes of the id's SHA-256 digest, reduced mod 100.
#[must_use]
pub fn rollout_bucket(id: &str) -> u64 {
    let digest = Sha256::digest(id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % 100
}

/// One registered feature
#[derive(Clone)]
pub struct FeatureDef {
    /// Stable feature id (also the `f` param token)
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Version string, part of the isolation boundary key
    pub version: String,
    /// Declared prop schema
    pub schema: ParamSchema,
    /// Props used when the incoming bag fails validation
    pub defaults: Map<String, Value>,
    /// Capabilities the feature announces
    pub capabilities: Vec<String>,
    /// Rollout gate
    pub enabled: Rollout,
    loader: ComponentLoader,
}

impl FeatureDef {
    /// Definition with a loader; version defaults to `1.0`, gate to `On`
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, loader: ComponentLoader) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            version: "1.0".to_owned(),
            schema: ParamSchema::new(),
            defaults: Map::new(),
            capabilities: Vec::new(),
            enabled: Rollout::On,
            loader,
        }
    }

    /// With a version
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// With a prop schema
    #[inline]
    #[must_use]
    pub fn with_schema(mut self, schema: ParamSchema) -> Self {
        self.schema = schema;
        self
    }

    /// With default props
    #[inline]
    #[must_use]
    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    /// With capabilities
    #[inline]
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// With a rollout gate
    #[inline]
    #[must_use]
    pub fn with_rollout(mut self, enabled: Rollout) -> Self {
        self.enabled = enabled;
        self
    }

    /// Isolation boundary key for this definition
    #[must_use]
    pub fn boundary_key(&self) -> String {
        format!("{}:{}", self.id, self.version)
    }

    /// Run the loader
    ///
    /// # Errors
    ///
    /// Returns the loader's [`FeatureError`] when it fails.
    pub async fn load(&self) -> Result<Box<dyn FeatureComponent>, FeatureError> {
        (self.loader)().await
    }
}

impl std::fmt::Debug for FeatureDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureDef")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("version", &self.version)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Registered feature definitions
#[derive(Default)]
pub struct FeatureRegistry {
    features: DashMap<String, Arc<FeatureDef>>,
}

impl FeatureRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous one with the same id
    pub fn register(&self, def: FeatureDef) {
        tracing::debug!(feature_id = %def.id, version = %def.version, "feature registered");
        self.features.insert(def.id.clone(), Arc::new(def));
    }

    /// Definition for an id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<FeatureDef>> {
        self.features.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether an id is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.features.contains_key(id)
    }

    /// Registered ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.features.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Ids admitted by their rollout gates, sorted
    #[must_use]
    pub fn enabled_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .features
            .iter()
            .filter(|e| e.value().enabled.admits(e.key()))
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of registered features
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl std::fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("features", &self.features.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Surface;
    use crate::error::RenderFault;
    use proptest::prelude::*;

    struct Stub;

    impl FeatureComponent for Stub {
        fn render(&self, _props: &Map<String, Value>) -> Result<Surface, RenderFault> {
            Ok(Surface::new("stub"))
        }
    }

    fn stub_loader() -> ComponentLoader {
        Arc::new(|| Box::pin(async { Ok(Box::new(Stub) as Box<dyn FeatureComponent>) }))
    }

    #[test]
    fn bucket_is_deterministic() {
        assert_eq!(rollout_bucket("incentives"), rollout_bucket("incentives"));
        assert!(rollout_bucket("incentives") < 100);
    }

    #[test]
    fn rollout_edges() {
        assert!(Rollout::On.admits("anything"));
        assert!(!Rollout::Off.admits("anything"));
        assert!(!Rollout::Percent(0).admits("anything"));
        assert!(Rollout::Percent(100).admits("anything"));
    }

    #[test]
    fn percent_rollout_follows_bucket() {
        let id = "work_packages";
        let bucket = rollout_bucket(id);
        let below = u8::try_from(bucket).unwrap();
        let above = u8::try_from(bucket + 1).unwrap();
        assert!(!Rollout::Percent(below).admits(id));
        assert!(Rollout::Percent(above).admits(id));
    }

    #[test]
    fn percent_rollout_distribution_is_roughly_proportional() {
        let admitted = (0..1000)
            .filter(|i| Rollout::Percent(30).admits(&format!("feature-{i}")))
            .count();
        // Buckets are uniform enough over 1000 synthetic ids that a 30%
        // gate lands well inside 20%..40%.
        assert!((200..=400).contains(&admitted), "admitted {admitted}");
    }

    #[test]
    fn registry_register_and_enabled_ids() {
        let registry = FeatureRegistry::new();
        registry.register(FeatureDef::new("incentives", "Incentives", stub_loader()));
        registry.register(
            FeatureDef::new("hidden", "Hidden", stub_loader()).with_rollout(Rollout::Off),
        );

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("incentives"));
        assert_eq!(registry.enabled_ids(), vec!["incentives".to_owned()]);
    }

    #[test]
    fn boundary_key_includes_version() {
        let def = FeatureDef::new("cart", "Cart", stub_loader()).with_version("2.1");
        assert_eq!(def.boundary_key(), "cart:2.1");
    }

    proptest! {
        #[test]
        fn buckets_stay_in_range(id in "[a-z_]{1,16}") {
            prop_assert!(rollout_bucket(&id) < 100);
        }
    }
}
