//! Overlay host state machine
//!
//! The `app` param is authoritative: [`OverlayHost::state`] is derived
//! from the session params on every read, so external mutation and
//! programmatic opens land in the same place. The host adds what the
//! param cannot carry: gating, lazy content, dismissal, route sync,
//! and focus restoration.

use crate::focus::FocusTracker;
use crate::registry::{OverlayComponent, OverlayRegistry, OverlaySurface};
use crate::session::SessionProvider;
use indexmap::IndexMap;
use opal_session::{
    QueryState, SyncGuard, FEATURE_PROP_PREFIX, PARAM_APP, PARAM_DEBUG, PARAM_FEATURES,
    PARAM_RETURN_TO,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Minimum swipe distance that counts as a dismissal
pub const SWIPE_DISMISS_THRESHOLD: f64 = 120.0;

/// Element id the close control is tracked under
const CLOSE_CONTROL_ID: &str = "overlay-close";

/// How an overlay was asked to go away
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DismissReason {
    /// Escape key
    Escape,
    /// Click on the backdrop
    Backdrop,
    /// Downward swipe over the given distance
    SwipeDown {
        /// Swipe distance in logical pixels
        distance: f64,
    },
    /// The window's close control
    CloseControl,
    /// Navigation away from the overlay
    Navigation,
}

/// Derived overlay state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayState {
    /// Whether an overlay is open
    pub is_open: bool,
    /// Key of the open overlay
    pub active_key: Option<String>,
    /// Non-reserved params visible to the overlay
    pub params: IndexMap<String, String>,
}

/// Side effects the host asks its surroundings to perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OverlayEffect {
    /// An overlay opened
    Opened {
        /// Overlay key
        key: String,
    },
    /// An overlay closed
    Closed {
        /// Overlay key
        key: String,
    },
    /// The caller must sign in before the overlay can open
    RedirectToLogin {
        /// Overlay that required auth
        key: String,
    },
    /// The caller's role is below the overlay's requirement
    AccessRestricted {
        /// Overlay that was blocked
        key: String,
    },
}

/// A pending replace-navigation produced by route sync
///
/// The sync guard lives as long as this value; callers drop it after
/// applying the navigation, which re-arms route sync.
pub struct RouteSync {
    /// Target path including preserved query params
    pub path: String,
    /// Always a replace, never a push
    pub replace: bool,
    _guard: SyncGuard,
}

impl std::fmt::Debug for RouteSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSync")
            .field("path", &self.path)
            .field("replace", &self.replace)
            .finish()
    }
}

#[derive(Default)]
struct ActiveContent {
    content: Option<Box<dyn OverlayComponent>>,
    introduced: Vec<String>,
    restricted: Option<String>,
}

/// Hosts the session's overlay window
pub struct OverlayHost {
    registry: Arc<OverlayRegistry>,
    query: QueryState,
    session: Arc<dyn SessionProvider>,
    focus: FocusTracker,
    active: Mutex<ActiveContent>,
    effects: broadcast::Sender<OverlayEffect>,
}

impl OverlayHost {
    /// Host over a registry, the session params, and a session source
    #[must_use]
    pub fn new(
        registry: Arc<OverlayRegistry>,
        query: QueryState,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        let (effects, _) = broadcast::channel(64);
        Self {
            registry,
            query,
            session,
            focus: FocusTracker::new(),
            active: Mutex::new(ActiveContent::default()),
            effects,
        }
    }

    /// Subscribe to host effects
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OverlayEffect> {
        self.effects.subscribe()
    }

    /// Focus tracker
    #[inline]
    #[must_use]
    pub fn focus(&self) -> &FocusTracker {
        &self.focus
    }

    /// Current state, derived from the session params
    #[must_use]
    pub fn state(&self) -> OverlayState {
        let snapshot = self.query.snapshot();
        let active_key = snapshot.get(PARAM_APP).map(ToOwned::to_owned);
        let mut params = IndexMap::new();
        for (key, value) in snapshot.iter() {
            if key == PARAM_APP
                || key == PARAM_FEATURES
                || key == PARAM_RETURN_TO
                || key == PARAM_DEBUG
                || key.starts_with(FEATURE_PROP_PREFIX)
            {
                continue;
            }
            params.insert(key.to_owned(), value.to_owned());
        }
        OverlayState {
            is_open: active_key.is_some(),
            active_key,
            params,
        }
    }

    /// Overlay blocked by the role gate, if any
    #[must_use]
    pub fn restricted(&self) -> Option<String> {
        self.active.lock().restricted.clone()
    }

    /// Open an overlay
    ///
    /// Unknown keys warn and do nothing. An auth-gated overlay without
    /// a signed-in user emits [`OverlayEffect::RedirectToLogin`]; a
    /// role-gated one transitions to the restricted state without
    /// loading content. Returns whether the overlay opened.
    pub async fn open(&self, key: &str, params: &[(&str, &str)]) -> bool {
        let Some(config) = self.registry.get(key) else {
            tracing::warn!(key, "unknown overlay key");
            return false;
        };

        let session = self.session.session();
        if config.requires_auth && session.user_id.is_none() {
            tracing::warn!(key, "overlay requires auth");
            let _ = self.effects.send(OverlayEffect::RedirectToLogin {
                key: key.to_owned(),
            });
            return false;
        }
        if !session.role.satisfies(config.required_role) {
            tracing::debug!(
                key,
                role = %session.role,
                required = %config.required_role,
                "overlay blocked by role gate"
            );
            self.active.lock().restricted = Some(key.to_owned());
            let _ = self.effects.send(OverlayEffect::AccessRestricted {
                key: key.to_owned(),
            });
            return false;
        }

        let content = match config.load().await {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(key, error = %err, "overlay load failed");
                return false;
            }
        };

        let mut pairs: Vec<(String, String)> = Vec::with_capacity(params.len() + 1);
        pairs.push((PARAM_APP.to_owned(), key.to_owned()));
        for (param_key, value) in params {
            pairs.push(((*param_key).to_owned(), (*value).to_owned()));
        }
        self.query.set_many(pairs);

        {
            let mut active = self.active.lock();
            active.content = Some(content);
            active.introduced = params.iter().map(|(k, _)| (*k).to_owned()).collect();
            active.restricted = None;
        }
        self.focus.capture_and_focus(CLOSE_CONTROL_ID);

        tracing::info!(key, "overlay opened");
        let _ = self.effects.send(OverlayEffect::Opened {
            key: key.to_owned(),
        });
        true
    }

    /// Render the open overlay's content
    #[must_use]
    pub fn view(&self) -> Option<OverlaySurface> {
        let state = self.state();
        if !state.is_open {
            return None;
        }
        let active = self.active.lock();
        active
            .content
            .as_ref()
            .map(|content| content.render(&state.params))
    }

    /// Close the open overlay
    ///
    /// Removes `app` and the params the open introduced; everything
    /// else survives. Returns whether an overlay was open.
    pub fn close(&self) -> bool {
        self.close_with(None)
    }

    /// Dismiss the open overlay for a reason
    ///
    /// A [`DismissReason::SwipeDown`] below the threshold is ignored.
    /// Returns whether the overlay closed.
    pub fn dismiss(&self, reason: DismissReason) -> bool {
        if let DismissReason::SwipeDown { distance } = reason {
            if distance < SWIPE_DISMISS_THRESHOLD {
                tracing::debug!(distance, "swipe below dismiss threshold, ignored");
                return false;
            }
        }
        self.close_with(Some(reason))
    }

    /// Replace-navigation needed to put the path on the active
    /// overlay's canonical route
    ///
    /// Returns `None` when no overlay is open, the overlay declares no
    /// routes, the path already matches, or a sync is in flight. While
    /// the returned [`RouteSync`] is alive, further calls return `None`.
    #[must_use]
    pub fn sync_route(&self, current_path: &str) -> Option<RouteSync> {
        if self.query.is_syncing() {
            return None;
        }
        let state = self.state();
        let key = state.active_key?;
        let config = self.registry.get(&key)?;
        let base = config.base_route()?;

        let on_route = config.routes.iter().any(|route| {
            let prefix = route.split(':').next().unwrap_or(route);
            let prefix = prefix.trim_end_matches('/');
            !prefix.is_empty()
                && (current_path == prefix || current_path.starts_with(&format!("{prefix}/")))
        });
        if on_route {
            return None;
        }

        let guard = self.query.begin_sync();
        let query = self.query.to_query_string();
        let path = if query.is_empty() {
            base.to_owned()
        } else {
            format!("{base}?{query}")
        };
        tracing::debug!(from = current_path, to = %path, "route sync");
        Some(RouteSync {
            path,
            replace: true,
            _guard: guard,
        })
    }

    /// Open the overlay an internal href points at
    ///
    /// External schemes pass through untouched. When the href matches a
    /// registered overlay's route and the route carries a trailing
    /// parameter segment, that segment becomes a param. Returns whether
    /// an overlay opened.
    pub async fn intercept_href(&self, href: &str) -> bool {
        if href.starts_with("http://")
            || href.starts_with("https://")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            return false;
        }

        let path = href.split('?').next().unwrap_or(href);
        let Some(config) = self.registry.match_route(path) else {
            return false;
        };

        let param = config.routes.iter().find_map(|route| {
            let (prefix, param_name) = route.split_once(':')?;
            let prefix = prefix.trim_end_matches('/');
            let rest = path.strip_prefix(prefix)?.trim_start_matches('/');
            if rest.is_empty() || rest.contains('/') {
                return None;
            }
            Some((param_name.to_owned(), rest.to_owned()))
        });

        let key = config.key.clone();
        match param {
            Some((name, value)) => self.open(&key, &[(name.as_str(), value.as_str())]).await,
            None => self.open(&key, &[]).await,
        }
    }

    /// Sign-in action from the restricted panel
    ///
    /// Emits [`OverlayEffect::RedirectToLogin`] for the blocked key.
    pub fn restricted_sign_in(&self) {
        let Some(key) = self.active.lock().restricted.take() else {
            return;
        };
        let _ = self.effects.send(OverlayEffect::RedirectToLogin { key });
    }

    /// Back action from the restricted panel
    pub fn restricted_back(&self) {
        self.active.lock().restricted = None;
    }

    fn close_with(&self, reason: Option<DismissReason>) -> bool {
        let Some(key) = self.query.get(PARAM_APP) else {
            return false;
        };

        let introduced = {
            let mut active = self.active.lock();
            active.content = None;
            std::mem::take(&mut active.introduced)
        };
        self.query.remove(PARAM_APP);
        for param in &introduced {
            self.query.remove(param);
        }
        self.focus.restore();

        tracing::info!(key = %key, ?reason, "overlay closed");
        let _ = self.effects.send(OverlayEffect::Closed { key });
        true
    }
}

impl std::fmt::Debug for OverlayHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayHost")
            .field("registry", &self.registry)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverlayError;
    use crate::registry::{OverlayComponent, OverlayConfig, OverlayLoader};
    use crate::session::{Role, Session, StaticSessionProvider};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        title: String,
    }

    impl OverlayComponent for Echo {
        fn render(&self, params: &IndexMap<String, String>) -> OverlaySurface {
            let body = params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            OverlaySurface::new(self.title.clone()).with_body(serde_json::Value::Object(body))
        }
    }

    fn echo_loader(title: &str, loads: Arc<AtomicUsize>) -> OverlayLoader {
        let title = title.to_owned();
        Arc::new(move || {
            let title = title.clone();
            let loads = Arc::clone(&loads);
            Box::pin(async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(Echo { title }) as Box<dyn OverlayComponent>)
            })
        })
    }

    fn failing_loader() -> OverlayLoader {
        Arc::new(|| {
            Box::pin(async {
                Err::<Box<dyn OverlayComponent>, _>(OverlayError::LoadFailed {
                    reason: "chunk missing".to_owned(),
                })
            })
        })
    }

    struct Fixture {
        host: OverlayHost,
        query: QueryState,
        session: Arc<StaticSessionProvider>,
        loads: Arc<AtomicUsize>,
    }

    fn fixture(configure: impl FnOnce(&OverlayRegistry, OverlayLoader)) -> Fixture {
        let registry = Arc::new(OverlayRegistry::new());
        let loads = Arc::new(AtomicUsize::new(0));
        configure(&registry, echo_loader("Window", Arc::clone(&loads)));
        let query = QueryState::new();
        let session = Arc::new(StaticSessionProvider::default());
        let host = OverlayHost::new(
            registry,
            query.clone(),
            Arc::clone(&session) as Arc<dyn SessionProvider>,
        );
        Fixture {
            host,
            query,
            session,
            loads,
        }
    }

    #[tokio::test]
    async fn open_sets_app_param_and_state() {
        let fx = fixture(|registry, loader| {
            registry.register(OverlayConfig::new("cart", "Cart", loader));
        });

        assert!(fx.host.open("cart", &[("item", "i-1")]).await);

        let state = fx.host.state();
        assert!(state.is_open);
        assert_eq!(state.active_key.as_deref(), Some("cart"));
        assert_eq!(state.params.get("item").map(String::as_str), Some("i-1"));
        assert_eq!(fx.query.get(PARAM_APP).as_deref(), Some("cart"));
    }

    #[tokio::test]
    async fn unknown_key_is_a_noop() {
        let fx = fixture(|_, _| {});
        assert!(!fx.host.open("mystery", &[]).await);
        assert!(!fx.host.state().is_open);
    }

    #[tokio::test]
    async fn auth_gate_redirects_to_login() {
        let fx = fixture(|registry, loader| {
            registry.register(OverlayConfig::new("orders", "Orders", loader).with_auth_required());
        });
        let mut effects = fx.host.subscribe();

        assert!(!fx.host.open("orders", &[]).await);
        assert!(!fx.host.state().is_open);
        assert_eq!(
            effects.recv().await.unwrap(),
            OverlayEffect::RedirectToLogin {
                key: "orders".to_owned()
            }
        );
        assert_eq!(fx.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn role_gate_restricts_without_loading() {
        let fx = fixture(|registry, loader| {
            registry.register(
                OverlayConfig::new("earnings", "Earnings", loader)
                    .with_required_role(Role::Member),
            );
        });
        fx.session.set(Session::signed_in("u1", Role::User));

        assert!(!fx.host.open("earnings", &[]).await);
        assert_eq!(fx.host.restricted().as_deref(), Some("earnings"));
        assert!(!fx.host.state().is_open);
        assert_eq!(fx.loads.load(Ordering::SeqCst), 0);

        fx.host.restricted_back();
        assert!(fx.host.restricted().is_none());
    }

    #[tokio::test]
    async fn restricted_sign_in_redirects() {
        let fx = fixture(|registry, loader| {
            registry.register(
                OverlayConfig::new("earnings", "Earnings", loader)
                    .with_required_role(Role::Admin),
            );
        });
        fx.session.set(Session::signed_in("u1", Role::Member));
        let mut effects = fx.host.subscribe();

        fx.host.open("earnings", &[]).await;
        fx.host.restricted_sign_in();

        assert_eq!(
            effects.recv().await.unwrap(),
            OverlayEffect::AccessRestricted {
                key: "earnings".to_owned()
            }
        );
        assert_eq!(
            effects.recv().await.unwrap(),
            OverlayEffect::RedirectToLogin {
                key: "earnings".to_owned()
            }
        );
        assert!(fx.host.restricted().is_none());
    }

    #[tokio::test]
    async fn close_removes_introduced_params_only() {
        let fx = fixture(|registry, loader| {
            registry.register(OverlayConfig::new("cart", "Cart", loader));
        });
        fx.query.set("f", "incentives");
        fx.query.set("lane", "priority");

        fx.host.open("cart", &[("item", "i-1")]).await;
        assert!(fx.host.close());

        assert!(!fx.host.state().is_open);
        assert!(fx.query.get(PARAM_APP).is_none());
        assert!(fx.query.get("item").is_none());
        assert_eq!(fx.query.get("f").as_deref(), Some("incentives"));
        assert_eq!(fx.query.get("lane").as_deref(), Some("priority"));
    }

    #[tokio::test]
    async fn swipe_below_threshold_is_ignored() {
        let fx = fixture(|registry, loader| {
            registry.register(OverlayConfig::new("cart", "Cart", loader));
        });
        fx.host.open("cart", &[]).await;

        assert!(!fx.host.dismiss(DismissReason::SwipeDown { distance: 80.0 }));
        assert!(fx.host.state().is_open);

        assert!(fx.host.dismiss(DismissReason::SwipeDown { distance: 150.0 }));
        assert!(!fx.host.state().is_open);
    }

    #[tokio::test]
    async fn external_param_mutation_drives_state() {
        let fx = fixture(|registry, loader| {
            registry.register(OverlayConfig::new("cart", "Cart", loader));
        });

        fx.query.set(PARAM_APP, "cart");
        let state = fx.host.state();
        assert!(state.is_open);
        assert_eq!(state.active_key.as_deref(), Some("cart"));

        fx.query.remove(PARAM_APP);
        assert!(!fx.host.state().is_open);
    }

    #[tokio::test]
    async fn view_renders_active_content_with_params() {
        let fx = fixture(|registry, loader| {
            registry.register(OverlayConfig::new("cart", "Cart", loader));
        });
        fx.host.open("cart", &[("item", "i-1")]).await;

        let surface = fx.host.view().unwrap();
        assert_eq!(surface.title, "Window");
        assert_eq!(surface.body, json!({"item": "i-1"}));

        fx.host.close();
        assert!(fx.host.view().is_none());
    }

    #[tokio::test]
    async fn load_failure_does_not_open() {
        let registry = Arc::new(OverlayRegistry::new());
        registry.register(OverlayConfig::new("cart", "Cart", failing_loader()));
        let query = QueryState::new();
        let host = OverlayHost::new(
            registry,
            query,
            Arc::new(StaticSessionProvider::default()),
        );

        assert!(!host.open("cart", &[]).await);
        assert!(!host.state().is_open);
    }

    #[tokio::test]
    async fn route_sync_replaces_to_base_route() {
        let fx = fixture(|registry, loader| {
            registry.register(
                OverlayConfig::new("events", "Events", loader)
                    .with_routes(["/events", "/events/:id"]),
            );
        });
        fx.host.open("events", &[("id", "e-1")]).await;

        let sync = fx.host.sync_route("/dashboard").unwrap();
        assert!(sync.replace);
        assert!(sync.path.starts_with("/events?"));
        assert!(sync.path.contains("app=events"));
        assert!(sync.path.contains("id=e-1"));

        // Guard held: a second pass must not re-trigger.
        assert!(fx.host.sync_route("/dashboard").is_none());
        drop(sync);
        assert!(fx.host.sync_route("/dashboard").is_some());
    }

    #[tokio::test]
    async fn route_sync_noop_when_already_on_route() {
        let fx = fixture(|registry, loader| {
            registry.register(
                OverlayConfig::new("events", "Events", loader).with_routes(["/events"]),
            );
        });
        fx.host.open("events", &[]).await;

        assert!(fx.host.sync_route("/events").is_none());
        assert!(fx.host.sync_route("/events/e-2").is_none());
    }

    #[tokio::test]
    async fn intercept_internal_href_opens_overlay() {
        let fx = fixture(|registry, loader| {
            registry.register(
                OverlayConfig::new("cart", "Cart", Arc::clone(&loader)).with_routes(["/cart"]),
            );
            registry.register(
                OverlayConfig::new("profile", "Profile", loader).with_routes(["/profile/:id"]),
            );
        });

        assert!(!fx.host.intercept_href("https://elsewhere.example/cart").await);
        assert!(!fx.host.intercept_href("mailto:team@example.com").await);
        assert!(!fx.host.intercept_href("/settings").await);

        assert!(fx.host.intercept_href("/cart?promo=1").await);
        assert_eq!(fx.host.state().active_key.as_deref(), Some("cart"));

        assert!(fx.host.intercept_href("/profile/u-9").await);
        let state = fx.host.state();
        assert_eq!(state.active_key.as_deref(), Some("profile"));
        assert_eq!(state.params.get("id").map(String::as_str), Some("u-9"));
    }

    #[tokio::test]
    async fn focus_restores_on_close() {
        let fx = fixture(|registry, loader| {
            registry.register(OverlayConfig::new("cart", "Cart", loader));
        });
        fx.host.focus().focus("open-cart-button");

        fx.host.open("cart", &[]).await;
        assert_eq!(fx.host.focus().current().as_deref(), Some("overlay-close"));

        fx.host.close();
        assert_eq!(
            fx.host.focus().current().as_deref(),
            Some("open-cart-button")
        );
    }
}
