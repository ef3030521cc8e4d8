//! Command bus pipeline
//!
//! The bus owns the dependency-injected parts and runs every invocation
//! through the same stages:
//! 1. Idempotency replay
//! 2. Contract and action resolution
//! 3. Parameter validation (collect all violations)
//! 4. Advisory permission logging
//! 5. Adapter execution
//! 6. Lifecycle events and fire-and-forget audit
//! 7. Result caching under the idempotency key

use std::sync::Arc;
use std::time::Duration;

use opal_contract::{schema, ContractRegistry};

use crate::adapter::AdapterRegistry;
use crate::audit::{AuditRecord, AuditSink, LedgerSink};
use crate::cache::IdempotencyCache;
use crate::events::{BusEvent, EventReceiver, KernelEventBus};
use crate::types::{CommandInvocation, CommandResult};

/// The command bus
///
/// `invoke` never returns `Err` and never panics; every failure mode is
/// a structured [`CommandResult`].
pub struct CommandBus {
    contracts: Arc<ContractRegistry>,
    adapters: Arc<AdapterRegistry>,
    cache: IdempotencyCache,
    events: KernelEventBus,
    audit: Arc<dyn AuditSink>,
}

impl CommandBus {
    /// Start building a bus
    #[inline]
    #[must_use]
    pub fn builder(contracts: Arc<ContractRegistry>) -> CommandBusBuilder {
        CommandBusBuilder::new(contracts)
    }

    /// Subscribe to lifecycle events
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Contract registry this bus resolves against
    #[inline]
    #[must_use]
    pub fn contracts(&self) -> &Arc<ContractRegistry> {
        &self.contracts
    }

    /// Execute one invocation through the full pipeline
    pub async fn invoke(&self, invocation: CommandInvocation) -> CommandResult {
        let app_id = invocation.app_id.clone();
        let action_id = invocation.action_id.clone();

        // 1. Replay check: cached results come back untouched, with no
        // re-validation and no adapter call.
        if let Some(key) = invocation.idempotency_key.as_deref() {
            if let Some(cached) = self.cache.get(key) {
                tracing::debug!(%app_id, %action_id, key, "idempotent replay");
                self.events.emit(BusEvent::IdempotentReplay {
                    app_id,
                    action_id,
                    key: key.to_string(),
                });
                return cached;
            }
        }

        let result = self.dispatch(&invocation).await;

        self.record_audit(&invocation, &result);

        // 7. Cache whatever went out, success or failure.
        if let Some(key) = invocation.idempotency_key.as_deref() {
            self.cache.insert(key, result.clone());
        }

        result
    }

    /// Stages 2-6: resolution, validation, execution, events
    async fn dispatch(&self, invocation: &CommandInvocation) -> CommandResult {
        let app_id = &invocation.app_id;
        let action_id = &invocation.action_id;

        // 2. Resolution
        let contract = match self.contracts.resolve(app_id) {
            Ok(contract) => contract,
            Err(err) => {
                tracing::warn!(%app_id, "contract resolution failed");
                return self.fail_with_event(app_id, action_id, err.to_string());
            }
        };
        let action = match contract.action(action_id) {
            Ok(action) => action,
            Err(err) => {
                tracing::warn!(%app_id, %action_id, "action resolution failed");
                return self.fail_with_event(app_id, action_id, err.to_string());
            }
        };

        // 3. Validation, collecting every violation
        if let Err(violations) = action.params.validate(&invocation.params) {
            let message = schema::join_violations(&violations);
            tracing::debug!(%app_id, %action_id, %message, "validation failed");
            self.events.emit(BusEvent::ValidationFailed {
                app_id: app_id.clone(),
                action_id: action_id.clone(),
                message: message.clone(),
            });
            return CommandResult::fail(message);
        }

        // 4. Permission check is advisory only; logged, never gating.
        if !action.required_permissions.is_empty() {
            tracing::debug!(
                %app_id,
                %action_id,
                user_id = %invocation.context.user_id,
                required_permissions = ?action.required_permissions,
                "permission check (advisory)"
            );
        }

        self.events.emit(BusEvent::Invoked {
            app_id: app_id.clone(),
            action_id: action_id.clone(),
            user_id: invocation.context.user_id.clone(),
        });

        // 5. Execution through the bound adapter (mock fallback)
        let adapter = self.adapters.resolve(app_id);
        let result = match adapter
            .execute(app_id, action_id, &invocation.params, &invocation.context)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(%app_id, %action_id, error = %err, "adapter failed");
                CommandResult::fail(err.to_string())
            }
        };

        // 6. Terminal lifecycle event
        if result.success {
            self.events.emit(BusEvent::Succeeded {
                app_id: app_id.clone(),
                action_id: action_id.clone(),
            });
        } else {
            self.events.emit(BusEvent::Failed {
                app_id: app_id.clone(),
                action_id: action_id.clone(),
                error: result.error.clone().unwrap_or_default(),
            });
        }

        result
    }

    fn fail_with_event(&self, app_id: &str, action_id: &str, message: String) -> CommandResult {
        self.events.emit(BusEvent::Failed {
            app_id: app_id.to_string(),
            action_id: action_id.to_string(),
            error: message.clone(),
        });
        CommandResult::fail(message)
    }

    /// Append to the audit sink without blocking the invoker
    fn record_audit(&self, invocation: &CommandInvocation, result: &CommandResult) {
        let sink = Arc::clone(&self.audit);
        let record = AuditRecord::new(
            invocation.app_id.clone(),
            invocation.action_id.clone(),
            invocation.params.clone(),
            invocation.context.clone(),
            result.clone(),
        );
        tokio::spawn(async move {
            if let Err(err) = sink.append(record).await {
                tracing::warn!(error = %err, "audit append failed");
            }
        });
    }
}

impl std::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBus")
            .field("contracts", &self.contracts.len())
            .field("adapters", &self.adapters)
            .finish()
    }
}

/// Builder wiring the bus parts
pub struct CommandBusBuilder {
    contracts: Arc<ContractRegistry>,
    adapters: Option<Arc<AdapterRegistry>>,
    cache_ttl: Option<Duration>,
    events: Option<KernelEventBus>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl CommandBusBuilder {
    /// New builder over a contract registry
    #[must_use]
    pub fn new(contracts: Arc<ContractRegistry>) -> Self {
        Self {
            contracts,
            adapters: None,
            cache_ttl: None,
            events: None,
            audit: None,
        }
    }

    /// With an adapter registry
    #[inline]
    #[must_use]
    pub fn adapters(mut self, adapters: Arc<AdapterRegistry>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    /// With a custom idempotency window
    #[inline]
    #[must_use]
    pub fn idempotency_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// With an externally owned event bus
    #[inline]
    #[must_use]
    pub fn events(mut self, events: KernelEventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// With an audit sink
    #[inline]
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Finish building; unset parts get defaults
    #[must_use]
    pub fn build(self) -> CommandBus {
        CommandBus {
            contracts: self.contracts,
            adapters: self
                .adapters
                .unwrap_or_else(|| Arc::new(AdapterRegistry::default())),
            cache: self
                .cache_ttl
                .map(IdempotencyCache::with_ttl)
                .unwrap_or_default(),
            events: self.events.unwrap_or_default(),
            audit: self.audit.unwrap_or_else(|| Arc::new(LedgerSink::new())),
        }
    }
}
