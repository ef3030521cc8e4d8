//! Feature host
//!
//! Mounts features named by the session's `f` param and renders each
//! one behind its own isolation boundary. A panic or fault inside one
//! component flips only that mount to [`MountState::Crashed`]; siblings
//! keep their surfaces. `retry` re-renders a crashed mount without
//! touching the others.

use crate::component::{FeatureComponent, Surface};
use crate::props::resolve_props;
use crate::registry::FeatureRegistry;
use indexmap::IndexMap;
use opal_session::{QueryState, FEATURE_PROP_PREFIX, PARAM_FEATURES};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Lifecycle state of one mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountState {
    /// Rendered successfully
    Mounted {
        /// The rendered output
        surface: Surface,
    },
    /// The id is not registered; a placeholder, never an error
    Unknown,
    /// Loading or rendering failed; contained to this mount
    Crashed {
        /// Fault description
        message: String,
    },
}

struct Mount {
    boundary_key: String,
    component: Option<Box<dyn FeatureComponent>>,
    state: MountState,
}

/// Hosts the session's mounted features
pub struct FeatureHost {
    registry: Arc<FeatureRegistry>,
    query: QueryState,
    mounts: Mutex<IndexMap<String, Mount>>,
}

impl FeatureHost {
    /// Host over a registry and the session's query state
    #[must_use]
    pub fn new(registry: Arc<FeatureRegistry>, query: QueryState) -> Self {
        Self {
            registry,
            query,
            mounts: Mutex::new(IndexMap::new()),
        }
    }

    /// Feature ids named by the `f` param, in order
    #[must_use]
    pub fn requested_features(&self) -> Vec<String> {
        self.query
            .get(PARAM_FEATURES)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registered ids admitted by their rollout gates
    #[must_use]
    pub fn enabled_features(&self) -> Vec<String> {
        self.registry.enabled_ids()
    }

    /// Mount everything the `f` param names
    ///
    /// Ids already mounted are re-rendered in place. Unknown ids become
    /// [`MountState::Unknown`] placeholders; ids whose rollout gate
    /// excludes them are skipped. Mounts for ids no longer listed are
    /// dropped.
    pub async fn mount_all(&self) {
        let requested = self.requested_features();
        {
            let mut mounts = self.mounts.lock();
            mounts.retain(|id, _| requested.iter().any(|r| r == id));
        }
        for id in requested {
            self.mount(&id).await;
        }
    }

    /// Mount a single feature id
    pub async fn mount(&self, id: &str) {
        let Some(def) = self.registry.get(id) else {
            tracing::debug!(feature_id = %id, "unknown feature, placeholder mounted");
            self.mounts.lock().insert(
                id.to_owned(),
                Mount {
                    boundary_key: format!("{id}:?"),
                    component: None,
                    state: MountState::Unknown,
                },
            );
            return;
        };

        if !def.enabled.admits(id) {
            tracing::debug!(feature_id = %id, "feature excluded by rollout gate");
            return;
        }

        let boundary_key = def.boundary_key();
        let component = match def.load().await {
            Ok(component) => component,
            Err(err) => {
                self.report_crash(&boundary_key, &err.to_string());
                self.mounts.lock().insert(
                    id.to_owned(),
                    Mount {
                        boundary_key,
                        component: None,
                        state: MountState::Crashed {
                            message: err.to_string(),
                        },
                    },
                );
                return;
            }
        };

        let props = resolve_props(&def, &self.query);
        let state = self.render_guarded(&boundary_key, component.as_ref(), &props);
        self.mounts.lock().insert(
            id.to_owned(),
            Mount {
                boundary_key,
                component: Some(component),
                state,
            },
        );
    }

    /// Re-render a crashed mount
    ///
    /// Clears the fault and renders the same component again with the
    /// current props; siblings are not remounted. When the original
    /// load failed, the loader runs again. Returns the new state, or
    /// `None` when the id is not mounted.
    pub async fn retry(&self, id: &str) -> Option<MountState> {
        let has_component = {
            let mounts = self.mounts.lock();
            let mount = mounts.get(id)?;
            mount.component.is_some()
        };

        if !has_component {
            self.mount(id).await;
            return self.state_of(id);
        }

        let def = self.registry.get(id)?;
        let props = resolve_props(&def, &self.query);
        let mut mounts = self.mounts.lock();
        let mount = mounts.get_mut(id)?;
        let state = {
            let component = mount.component.as_deref()?;
            self.render_guarded(&mount.boundary_key, component, &props)
        };
        mount.state = state.clone();
        Some(state)
    }

    /// Set one prop param for a mounted feature
    pub fn update_feature_props(&self, id: &str, key: &str, value: &str) {
        self.query
            .set(format!("{FEATURE_PROP_PREFIX}{id}.{key}"), value);
    }

    /// Close a feature: drop its mount, remove it from `f`, and purge
    /// every `fx.<id>.*` param
    pub fn close_feature(&self, id: &str) {
        self.mounts.lock().shift_remove(id);

        let remaining: Vec<String> = self
            .requested_features()
            .into_iter()
            .filter(|f| f != id)
            .collect();
        if remaining.is_empty() {
            self.query.remove(PARAM_FEATURES);
        } else {
            self.query.set(PARAM_FEATURES, remaining.join(","));
        }
        self.query
            .remove_prefix(&format!("{FEATURE_PROP_PREFIX}{id}."));
        tracing::debug!(feature_id = %id, "feature closed");
    }

    /// State of one mount
    #[must_use]
    pub fn state_of(&self, id: &str) -> Option<MountState> {
        self.mounts.lock().get(id).map(|m| m.state.clone())
    }

    /// All mounts in mount order
    #[must_use]
    pub fn mount_states(&self) -> Vec<(String, MountState)> {
        self.mounts
            .lock()
            .iter()
            .map(|(id, mount)| (id.clone(), mount.state.clone()))
            .collect()
    }

    /// Number of live mounts
    #[must_use]
    pub fn mounted_count(&self) -> usize {
        self.mounts.lock().len()
    }

    fn render_guarded(
        &self,
        boundary_key: &str,
        component: &dyn FeatureComponent,
        props: &serde_json::Map<String, serde_json::Value>,
    ) -> MountState {
        let outcome = catch_unwind(AssertUnwindSafe(|| component.render(props)));
        match outcome {
            Ok(Ok(surface)) => MountState::Mounted { surface },
            Ok(Err(fault)) => {
                self.report_crash(boundary_key, &fault.message);
                MountState::Crashed {
                    message: fault.message,
                }
            }
            Err(panic) => {
                let message = panic_message(&panic);
                self.report_crash(boundary_key, &message);
                MountState::Crashed { message }
            }
        }
    }

    fn report_crash(&self, boundary_key: &str, message: &str) {
        tracing::error!(boundary = %boundary_key, message, "feature crashed");
    }
}

impl std::fmt::Debug for FeatureHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureHost")
            .field("registry", &self.registry)
            .field("mounted", &self.mounts.lock().len())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "feature panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderFault;
    use crate::registry::{ComponentLoader, FeatureDef, Rollout};
    use serde_json::{json, Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        title: String,
        renders: Arc<AtomicUsize>,
    }

    impl FeatureComponent for Echo {
        fn render(&self, props: &Map<String, Value>) -> Result<Surface, RenderFault> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            Ok(Surface::new(self.title.clone()).with_body(Value::Object(props.clone())))
        }
    }

    struct Panicky {
        attempts: Arc<AtomicUsize>,
        fail_times: usize,
    }

    impl FeatureComponent for Panicky {
        fn render(&self, _props: &Map<String, Value>) -> Result<Surface, RenderFault> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            assert!(attempt >= self.fail_times, "boom");
            Ok(Surface::new("recovered"))
        }
    }

    fn echo_loader(title: &str, renders: Arc<AtomicUsize>) -> ComponentLoader {
        let title = title.to_owned();
        Arc::new(move || {
            let title = title.clone();
            let renders = Arc::clone(&renders);
            Box::pin(async move {
                Ok(Box::new(Echo { title, renders }) as Box<dyn FeatureComponent>)
            })
        })
    }

    fn panicky_loader(attempts: Arc<AtomicUsize>, fail_times: usize) -> ComponentLoader {
        Arc::new(move || {
            let attempts = Arc::clone(&attempts);
            Box::pin(async move {
                Ok(Box::new(Panicky {
                    attempts,
                    fail_times,
                }) as Box<dyn FeatureComponent>)
            })
        })
    }

    fn host_with(defs: Vec<FeatureDef>) -> (FeatureHost, QueryState) {
        let registry = Arc::new(FeatureRegistry::new());
        for def in defs {
            registry.register(def);
        }
        let query = QueryState::new();
        let host = FeatureHost::new(registry, query.clone());
        (host, query)
    }

    #[tokio::test]
    async fn mounts_from_feature_param() {
        let renders = Arc::new(AtomicUsize::new(0));
        let (host, query) = host_with(vec![FeatureDef::new(
            "incentives",
            "Incentives",
            echo_loader("Incentives", Arc::clone(&renders)),
        )]);
        query.set(PARAM_FEATURES, "incentives");
        query.set("fx.incentives.program", "\"p-1\"");

        host.mount_all().await;

        match host.state_of("incentives") {
            Some(MountState::Mounted { surface }) => {
                assert_eq!(surface.title, "Incentives");
                assert_eq!(surface.body, json!({"program": "p-1"}));
            }
            other => panic!("expected mounted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_id_gets_placeholder() {
        let (host, query) = host_with(vec![]);
        query.set(PARAM_FEATURES, "mystery");

        host.mount_all().await;
        assert_eq!(host.state_of("mystery"), Some(MountState::Unknown));
    }

    #[tokio::test]
    async fn enabled_features_respects_rollout_gates() {
        let renders = Arc::new(AtomicUsize::new(0));
        let (host, _query) = host_with(vec![
            FeatureDef::new("live", "Live", echo_loader("Live", Arc::clone(&renders))),
            FeatureDef::new("dark", "Dark", echo_loader("Dark", Arc::clone(&renders)))
                .with_rollout(Rollout::Off),
        ]);

        assert_eq!(host.enabled_features(), vec!["live".to_owned()]);
    }

    #[tokio::test]
    async fn crash_is_contained_to_one_mount() {
        let renders = Arc::new(AtomicUsize::new(0));
        let attempts = Arc::new(AtomicUsize::new(0));
        let (host, query) = host_with(vec![
            FeatureDef::new("steady", "Steady", echo_loader("Steady", Arc::clone(&renders))),
            FeatureDef::new("flaky", "Flaky", panicky_loader(Arc::clone(&attempts), 1)),
        ]);
        query.set(PARAM_FEATURES, "steady,flaky");

        host.mount_all().await;

        assert!(matches!(
            host.state_of("steady"),
            Some(MountState::Mounted { .. })
        ));
        match host.state_of("flaky") {
            Some(MountState::Crashed { message }) => assert_eq!(message, "boom"),
            other => panic!("expected crashed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_restores_without_remounting_siblings() {
        let renders = Arc::new(AtomicUsize::new(0));
        let attempts = Arc::new(AtomicUsize::new(0));
        let (host, query) = host_with(vec![
            FeatureDef::new("steady", "Steady", echo_loader("Steady", Arc::clone(&renders))),
            FeatureDef::new("flaky", "Flaky", panicky_loader(Arc::clone(&attempts), 1)),
        ]);
        query.set(PARAM_FEATURES, "steady,flaky");
        host.mount_all().await;

        let sibling_renders = renders.load(Ordering::SeqCst);
        let restored = host.retry("flaky").await;

        assert!(matches!(restored, Some(MountState::Mounted { .. })));
        assert_eq!(renders.load(Ordering::SeqCst), sibling_renders);
    }

    #[tokio::test]
    async fn rollout_excluded_features_are_skipped() {
        let renders = Arc::new(AtomicUsize::new(0));
        let (host, query) = host_with(vec![FeatureDef::new(
            "gated",
            "Gated",
            echo_loader("Gated", Arc::clone(&renders)),
        )
        .with_rollout(Rollout::Off)]);
        query.set(PARAM_FEATURES, "gated");

        host.mount_all().await;
        assert_eq!(host.state_of("gated"), None);
        assert_eq!(host.mounted_count(), 0);
    }

    #[tokio::test]
    async fn close_purges_props_and_param() {
        let renders = Arc::new(AtomicUsize::new(0));
        let (host, query) = host_with(vec![
            FeatureDef::new("a", "A", echo_loader("A", Arc::clone(&renders))),
            FeatureDef::new("b", "B", echo_loader("B", Arc::clone(&renders))),
        ]);
        query.set(PARAM_FEATURES, "a,b");
        query.set("fx.a.key", "1");
        query.set("fx.b.key", "2");
        host.mount_all().await;

        host.close_feature("a");

        assert_eq!(query.get(PARAM_FEATURES).as_deref(), Some("b"));
        assert!(query.get("fx.a.key").is_none());
        assert_eq!(query.get("fx.b.key").as_deref(), Some("2"));
        assert_eq!(host.state_of("a"), None);

        host.close_feature("b");
        assert!(query.get(PARAM_FEATURES).is_none());
    }

    #[tokio::test]
    async fn update_feature_props_writes_param() {
        let renders = Arc::new(AtomicUsize::new(0));
        let (host, query) = host_with(vec![FeatureDef::new(
            "cart",
            "Cart",
            echo_loader("Cart", Arc::clone(&renders)),
        )]);

        host.update_feature_props("cart", "note", "hello");
        assert_eq!(query.get("fx.cart.note").as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn mount_all_drops_unlisted_mounts() {
        let renders = Arc::new(AtomicUsize::new(0));
        let (host, query) = host_with(vec![
            FeatureDef::new("a", "A", echo_loader("A", Arc::clone(&renders))),
            FeatureDef::new("b", "B", echo_loader("B", Arc::clone(&renders))),
        ]);
        query.set(PARAM_FEATURES, "a,b");
        host.mount_all().await;
        assert_eq!(host.mounted_count(), 2);

        query.set(PARAM_FEATURES, "b");
        host.mount_all().await;
        assert_eq!(host.mounted_count(), 1);
        assert!(host.state_of("a").is_none());
    }
}
