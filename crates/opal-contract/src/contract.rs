//! AppContract records and their fluent builder

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::ContractError;
use crate::schema::ParamSchema;

/// Context kinds an app may run under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// Personal context
    User,
    /// Business account context
    Business,
    /// Farm operation context
    Farm,
    /// Stallion roster context
    Stallion,
    /// Producer context
    Producer,
}

impl ContextKind {
    /// Name as it appears in session params
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ContextKind::User => "user",
            ContextKind::Business => "business",
            ContextKind::Farm => "farm",
            ContextKind::Stallion => "stallion",
            ContextKind::Producer => "producer",
        }
    }

    /// All context kinds
    #[inline]
    #[must_use]
    pub fn all() -> [ContextKind; 5] {
        [
            ContextKind::User,
            ContextKind::Business,
            ContextKind::Farm,
            ContextKind::Stallion,
            ContextKind::Producer,
        ]
    }
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContextKind {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ContextKind::User),
            "business" => Ok(ContextKind::Business),
            "farm" => Ok(ContextKind::Farm),
            "stallion" => Ok(ContextKind::Stallion),
            "producer" => Ok(ContextKind::Producer),
            other => Err(ContractError::UnknownContextKind(other.to_string())),
        }
    }
}

/// How the app prefers to be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    /// Full-screen overlay
    Overlay,
    /// Side panel
    Panel,
    /// Dedicated page
    Page,
}

impl FromStr for PresentationMode {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overlay" => Ok(PresentationMode::Overlay),
            "panel" => Ok(PresentationMode::Panel),
            "page" => Ok(PresentationMode::Page),
            other => Err(ContractError::UnknownPresentationMode(other.to_string())),
        }
    }
}

/// Display hints for hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayHints {
    /// Preferred presentation
    pub mode: PresentationMode,
    /// Icon identifier
    pub icon: Option<String>,
}

impl Default for DisplayHints {
    fn default() -> Self {
        Self {
            mode: PresentationMode::Overlay,
            icon: None,
        }
    }
}

/// One invocable action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Parameter schema checked at invocation time
    pub params: ParamSchema,
    /// Permissions the caller should hold (advisory, logged only)
    pub required_permissions: Vec<String>,
}

impl ActionSpec {
    /// Action with a schema and no permission list
    #[inline]
    #[must_use]
    pub fn new(params: ParamSchema) -> Self {
        Self {
            params,
            required_permissions: Vec::new(),
        }
    }

    /// With required permissions
    #[inline]
    #[must_use]
    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.required_permissions = permissions;
        self
    }
}

/// One emittable event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Payload schema
    pub schema: ParamSchema,
}

/// Declarative app description
///
/// Immutable after registration; the registry hands out `Arc`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppContract {
    /// Stable app id (`"events"`, `"cart"`)
    pub id: String,
    /// Contract version string
    pub version: String,
    /// Human-readable name
    pub name: String,
    /// Intents this app can handle
    pub intents: Vec<String>,
    /// Actions keyed by action id
    pub actions: BTreeMap<String, ActionSpec>,
    /// Events keyed by event id
    pub events: BTreeMap<String, EventSpec>,
    /// Contexts the app may run under
    pub allowed_contexts: Vec<ContextKind>,
    /// Capability tags used for discovery
    pub capabilities: Vec<String>,
    /// Whether discovery surfaces should feature this app
    pub featured: bool,
    /// Display hints
    pub display: DisplayHints,
}

impl AppContract {
    /// Start building a contract
    #[inline]
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> AppContractBuilder {
        AppContractBuilder::new(id, name)
    }

    /// Look up an action
    ///
    /// # Errors
    /// `ContractError::ActionNotFound` when the contract has no such action.
    pub fn action(&self, action_id: &str) -> Result<&ActionSpec, ContractError> {
        self.actions
            .get(action_id)
            .ok_or_else(|| ContractError::ActionNotFound {
                app_id: self.id.clone(),
                action_id: action_id.to_string(),
            })
    }

    /// Whether the app declares the given intent
    #[inline]
    #[must_use]
    pub fn handles_intent(&self, intent: &str) -> bool {
        self.intents.iter().any(|i| i == intent)
    }

    /// Whether the app may run under the given context kind
    #[inline]
    #[must_use]
    pub fn supports_context(&self, kind: ContextKind) -> bool {
        self.allowed_contexts.contains(&kind)
    }
}

/// Fluent builder for [`AppContract`]
#[derive(Debug, Clone)]
pub struct AppContractBuilder {
    contract: AppContract,
}

impl AppContractBuilder {
    /// New builder with defaults: version `"1.0"`, all contexts allowed
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            contract: AppContract {
                id: id.into(),
                version: "1.0".to_string(),
                name: name.into(),
                intents: Vec::new(),
                actions: BTreeMap::new(),
                events: BTreeMap::new(),
                allowed_contexts: ContextKind::all().to_vec(),
                capabilities: Vec::new(),
                featured: false,
                display: DisplayHints::default(),
            },
        }
    }

    /// Set the contract version
    #[inline]
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.contract.version = version.into();
        self
    }

    /// Declare a handled intent
    #[inline]
    #[must_use]
    pub fn intent(mut self, intent: impl Into<String>) -> Self {
        self.contract.intents.push(intent.into());
        self
    }

    /// Declare an action
    #[inline]
    #[must_use]
    pub fn action(mut self, action_id: impl Into<String>, spec: ActionSpec) -> Self {
        self.contract.actions.insert(action_id.into(), spec);
        self
    }

    /// Declare an event
    #[inline]
    #[must_use]
    pub fn event(mut self, event_id: impl Into<String>, spec: EventSpec) -> Self {
        self.contract.events.insert(event_id.into(), spec);
        self
    }

    /// Restrict allowed contexts
    #[inline]
    #[must_use]
    pub fn contexts(mut self, contexts: Vec<ContextKind>) -> Self {
        self.contract.allowed_contexts = contexts;
        self
    }

    /// Declare a capability tag
    #[inline]
    #[must_use]
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.contract.capabilities.push(capability.into());
        self
    }

    /// Mark as featured in discovery surfaces
    #[inline]
    #[must_use]
    pub fn featured(mut self, featured: bool) -> Self {
        self.contract.featured = featured;
        self
    }

    /// Set display hints
    #[inline]
    #[must_use]
    pub fn display(mut self, display: DisplayHints) -> Self {
        self.contract.display = display;
        self
    }

    /// Finish building
    #[inline]
    #[must_use]
    pub fn build(self) -> AppContract {
        self.contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParamSchema, ParamType};

    #[test]
    fn context_kind_round_trip() {
        for kind in ContextKind::all() {
            let parsed: ContextKind = kind.name().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn context_kind_rejects_unknown() {
        let result: Result<ContextKind, _> = "warehouse".parse();
        assert!(matches!(
            result,
            Err(ContractError::UnknownContextKind(_))
        ));
    }

    #[test]
    fn builder_produces_complete_contract() {
        let contract = AppContract::builder("events", "Events")
            .version("2.1")
            .intent("create_event")
            .action(
                "create_event",
                ActionSpec::new(
                    ParamSchema::new()
                        .required("title", ParamType::String)
                        .required("starts_at", ParamType::DateTime),
                )
                .with_permissions(vec!["events.write".to_string()]),
            )
            .contexts(vec![ContextKind::Business, ContextKind::Farm])
            .capability("scheduling")
            .featured(true)
            .build();

        assert_eq!(contract.id, "events");
        assert_eq!(contract.version, "2.1");
        assert!(contract.handles_intent("create_event"));
        assert!(contract.supports_context(ContextKind::Farm));
        assert!(!contract.supports_context(ContextKind::User));
        assert!(contract.featured);

        let action = contract.action("create_event").unwrap();
        assert_eq!(action.required_permissions, vec!["events.write"]);
    }

    #[test]
    fn action_lookup_unknown_is_error() {
        let contract = AppContract::builder("cart", "Cart").build();
        let result = contract.action("checkout");
        assert!(matches!(
            result,
            Err(ContractError::ActionNotFound { .. })
        ));
    }

    #[test]
    fn builder_defaults_allow_all_contexts() {
        let contract = AppContract::builder("cart", "Cart").build();
        for kind in ContextKind::all() {
            assert!(contract.supports_context(kind));
        }
    }
}
