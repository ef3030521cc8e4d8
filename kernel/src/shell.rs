//! Platform shell
//!
//! One facade owning every kernel part: contract and adapter registries,
//! the command bus, the context stack, the policy guard, session query
//! state, and the feature and overlay hosts. Callers construct a shell,
//! register their apps, and drive everything through it.

use opal_bus::{
    AdapterRegistry, CommandBus, CommandInvocation, CommandResult, EventReceiver, KernelEventBus,
    LedgerSink,
};
use opal_contract::ContractRegistry;
use opal_feature::{FeatureHost, FeatureRegistry};
use opal_overlay::{OverlayHost, OverlayRegistry, Session, StaticSessionProvider};
use opal_policy::{PolicyConfig, PolicyGuard};
use opal_session::{ContextManager, QueryState};
use std::sync::Arc;
use std::time::Duration;

/// Shell construction knobs
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Route every app to the mock adapter
    pub demo_mode: bool,
    /// How long replayed results stay fresh
    pub idempotency_ttl: Duration,
    /// Policy guard configuration
    pub policy: PolicyConfig,
}

impl ShellConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With demo mode on
    #[inline]
    #[must_use]
    pub fn with_demo_mode(mut self) -> Self {
        self.demo_mode = true;
        self
    }

    /// With an idempotency TTL
    #[inline]
    #[must_use]
    pub fn with_idempotency_ttl(mut self, ttl: Duration) -> Self {
        self.idempotency_ttl = ttl;
        self
    }

    /// With a policy configuration
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            demo_mode: false,
            idempotency_ttl: Duration::from_secs(300),
            policy: PolicyConfig::default(),
        }
    }
}

/// The assembled platform kernel
pub struct PlatformShell {
    contracts: Arc<ContractRegistry>,
    adapters: Arc<AdapterRegistry>,
    bus: CommandBus,
    contexts: ContextManager,
    policy: PolicyGuard,
    query: QueryState,
    features: Arc<FeatureRegistry>,
    feature_host: FeatureHost,
    overlays: Arc<OverlayRegistry>,
    overlay_host: OverlayHost,
    session: Arc<StaticSessionProvider>,
    ledger: Arc<LedgerSink>,
}

impl PlatformShell {
    /// Wire a shell from its configuration
    #[must_use]
    pub fn new(config: &ShellConfig) -> Self {
        let contracts = Arc::new(ContractRegistry::new());
        let adapters = Arc::new(AdapterRegistry::new(config.demo_mode));
        let ledger = Arc::new(LedgerSink::new());
        let events = KernelEventBus::new(256);

        let bus = CommandBus::builder(Arc::clone(&contracts))
            .adapters(Arc::clone(&adapters))
            .idempotency_ttl(config.idempotency_ttl)
            .events(events)
            .audit(ledger.clone())
            .build();

        let query = QueryState::new();
        let features = Arc::new(FeatureRegistry::new());
        let feature_host = FeatureHost::new(Arc::clone(&features), query.clone());

        let session = Arc::new(StaticSessionProvider::new(Session::anonymous()));
        let overlays = Arc::new(OverlayRegistry::new());
        let overlay_host = OverlayHost::new(
            Arc::clone(&overlays),
            query.clone(),
            session.clone() as Arc<dyn opal_overlay::SessionProvider>,
        );

        tracing::info!(demo_mode = config.demo_mode, "platform shell assembled");

        Self {
            contracts,
            adapters,
            bus,
            contexts: ContextManager::new(),
            policy: PolicyGuard::new(config.policy),
            query,
            features,
            feature_host,
            overlays,
            overlay_host,
            session,
            ledger,
        }
    }

    /// Run an invocation behind the policy guard
    ///
    /// A denial never reaches the bus; it comes back as a failed result
    /// carrying the guard's reason.
    pub async fn invoke_guarded(&self, invocation: CommandInvocation) -> CommandResult {
        let decision = self
            .policy
            .check_policy(&invocation.context.user_id, &invocation.action_id);
        if !decision.allowed {
            let reason = decision.reason.unwrap_or_else(|| "Policy denied".to_owned());
            tracing::warn!(
                app_id = %invocation.app_id,
                action_id = %invocation.action_id,
                %reason,
                "invocation blocked by policy"
            );
            return CommandResult::fail(reason);
        }
        self.bus.invoke(invocation).await
    }

    /// Contract registry
    #[inline]
    #[must_use]
    pub fn contracts(&self) -> &Arc<ContractRegistry> {
        &self.contracts
    }

    /// Adapter registry
    #[inline]
    #[must_use]
    pub fn adapters(&self) -> &Arc<AdapterRegistry> {
        &self.adapters
    }

    /// Command bus
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &CommandBus {
        &self.bus
    }

    /// Context stack
    #[inline]
    #[must_use]
    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    /// Policy guard
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &PolicyGuard {
        &self.policy
    }

    /// Session query state
    #[inline]
    #[must_use]
    pub fn query(&self) -> &QueryState {
        &self.query
    }

    /// Feature registry
    #[inline]
    #[must_use]
    pub fn features(&self) -> &Arc<FeatureRegistry> {
        &self.features
    }

    /// Feature host
    #[inline]
    #[must_use]
    pub fn feature_host(&self) -> &FeatureHost {
        &self.feature_host
    }

    /// Overlay registry
    #[inline]
    #[must_use]
    pub fn overlays(&self) -> &Arc<OverlayRegistry> {
        &self.overlays
    }

    /// Overlay host
    #[inline]
    #[must_use]
    pub fn overlay_host(&self) -> &OverlayHost {
        &self.overlay_host
    }

    /// Swap the signed-in session
    pub fn set_session(&self, session: Session) {
        self.session.set(session);
    }

    /// Subscribe to bus lifecycle events
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }

    /// Audit ledger
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &Arc<LedgerSink> {
        &self.ledger
    }
}

impl std::fmt::Debug for PlatformShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformShell")
            .field("contracts", &self.contracts.len())
            .field("features", &self.features.len())
            .field("overlays", &self.overlays.len())
            .field("audit_entries", &self.ledger.len())
            .finish_non_exhaustive()
    }
}
