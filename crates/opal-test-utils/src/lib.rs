//! Testing utilities for the OPAL workspace
//!
//! Shared fixtures: scripted adapters, contract/feature/overlay
//! definitions, and setup helpers.

#![allow(missing_docs)]

use async_trait::async_trait;
use opal_bus::{AdapterError, AppAdapter, CommandContext, CommandResult};
use opal_contract::{ActionSpec, AppContract, ContextKind, ParamSchema, ParamType};
use opal_feature::{
    ComponentLoader, FeatureComponent, FeatureDef, RenderFault, Rollout, Surface,
};
use opal_overlay::{OverlayComponent, OverlayConfig, OverlayLoader, OverlaySurface, Role};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Adapter that replays a scripted sequence of outcomes, one per call
///
/// When the script runs out, the last outcome repeats.
pub struct ScriptedAdapter {
    script: Mutex<Vec<Result<CommandResult, AdapterError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedAdapter {
    #[must_use]
    pub fn new(script: Vec<Result<CommandResult, AdapterError>>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn always_ok(data: Value) -> Self {
        Self::new(vec![Ok(CommandResult::ok(data))])
    }

    #[must_use]
    pub fn always_err(reason: &str) -> Self {
        Self::new(vec![Err(AdapterError::Upstream(reason.to_owned()))])
    }

    /// `(app_id, action_id)` pairs in call order
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl AppAdapter for ScriptedAdapter {
    async fn execute(
        &self,
        app_id: &str,
        action_id: &str,
        _params: &Value,
        _context: &CommandContext,
    ) -> Result<CommandResult, AdapterError> {
        self.calls
            .lock()
            .push((app_id.to_owned(), action_id.to_owned()));
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script
                .first()
                .cloned()
                .unwrap_or_else(|| Ok(CommandResult::ok(json!({}))))
        }
    }
}

/// Events contract: `create_event` with a schema, business/farm only
#[must_use]
pub fn events_contract() -> AppContract {
    AppContract::builder("events", "Events")
        .version("1.2")
        .intent("schedule")
        .action(
            "create_event",
            ActionSpec::new(
                ParamSchema::new()
                    .required("title", ParamType::String)
                    .required("starts_at", ParamType::DateTime)
                    .optional("capacity", ParamType::Number),
            ),
        )
        .action("cancel_event", ActionSpec::new(ParamSchema::new().required("event_id", ParamType::Uuid)))
        .contexts(vec![ContextKind::Business, ContextKind::Farm])
        .capability("scheduling")
        .featured(true)
        .build()
}

/// Cart contract: schema-free `add_item` plus a checkout action
#[must_use]
pub fn cart_contract() -> AppContract {
    AppContract::builder("cart", "Cart")
        .intent("purchase")
        .action("add_item", ActionSpec::new(ParamSchema::new()))
        .action(
            "checkout",
            ActionSpec::new(ParamSchema::new().required("payment_method", ParamType::String))
                .with_permissions(vec!["cart.checkout".to_owned()]),
        )
        .capability("commerce")
        .build()
}

/// Component echoing its props into the surface body
#[derive(Debug, Clone)]
pub struct EchoComponent {
    pub title: String,
}

impl FeatureComponent for EchoComponent {
    fn render(&self, props: &Map<String, Value>) -> Result<Surface, RenderFault> {
        Ok(Surface::new(self.title.clone()).with_body(Value::Object(props.clone())))
    }
}

/// Component that always panics inside `render`
#[derive(Debug, Clone)]
pub struct PanickingComponent;

impl FeatureComponent for PanickingComponent {
    fn render(&self, _props: &Map<String, Value>) -> Result<Surface, RenderFault> {
        panic!("fixture panic");
    }
}

#[must_use]
pub fn echo_feature_loader(title: &str) -> ComponentLoader {
    let title = title.to_owned();
    Arc::new(move || {
        let title = title.clone();
        Box::pin(async move {
            Ok(Box::new(EchoComponent { title }) as Box<dyn FeatureComponent>)
        })
    })
}

#[must_use]
pub fn panicking_feature_loader() -> ComponentLoader {
    Arc::new(|| Box::pin(async { Ok(Box::new(PanickingComponent) as Box<dyn FeatureComponent>) }))
}

/// Incentives feature with defaults and a full rollout
#[must_use]
pub fn incentives_feature() -> FeatureDef {
    let mut defaults = Map::new();
    defaults.insert("mode".to_owned(), json!("view"));
    FeatureDef::new("incentives", "Incentives", echo_feature_loader("Incentives"))
        .with_defaults(defaults)
        .with_capabilities(["entries"])
        .with_rollout(Rollout::On)
}

/// Work packages feature
#[must_use]
pub fn work_packages_feature() -> FeatureDef {
    FeatureDef::new(
        "work_packages",
        "Work Packages",
        echo_feature_loader("Work Packages"),
    )
}

#[derive(Debug, Clone)]
struct EchoOverlay {
    title: String,
}

impl OverlayComponent for EchoOverlay {
    fn render(&self, params: &indexmap::IndexMap<String, String>) -> OverlaySurface {
        let body = params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        OverlaySurface::new(self.title.clone()).with_body(Value::Object(body))
    }
}

#[must_use]
pub fn echo_overlay_loader(title: &str) -> OverlayLoader {
    let title = title.to_owned();
    Arc::new(move || {
        let title = title.clone();
        Box::pin(async move { Ok(Box::new(EchoOverlay { title }) as Box<dyn OverlayComponent>) })
    })
}

/// Cart overlay, open to everyone, on `/cart`
#[must_use]
pub fn cart_overlay() -> OverlayConfig {
    OverlayConfig::new("cart", "Cart", echo_overlay_loader("Cart")).with_routes(["/cart"])
}

/// Earnings overlay requiring a signed-in member
#[must_use]
pub fn earnings_overlay() -> OverlayConfig {
    OverlayConfig::new("earnings", "Earnings", echo_overlay_loader("Earnings"))
        .with_auth_required()
        .with_required_role(Role::Member)
        .with_routes(["/earnings"])
}
