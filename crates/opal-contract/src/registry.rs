//! Contract registry
//!
//! Provides [`ContractRegistry`] for registering and discovering app
//! contracts. Registration is a pure map insert: re-registering an app id
//! silently overwrites, and no shape validation runs.

use dashmap::DashMap;
use std::sync::Arc;

use crate::contract::{AppContract, ContextKind};
use crate::error::ContractError;

/// Concurrent registry of app contracts keyed by app id
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: DashMap<String, Arc<AppContract>>,
}

impl ContractRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            contracts: DashMap::new(),
        }
    }

    /// Register a contract, overwriting any previous registration
    pub fn register(&self, contract: AppContract) {
        self.contracts
            .insert(contract.id.clone(), Arc::new(contract));
    }

    /// Look up a contract by app id
    #[must_use]
    pub fn get(&self, app_id: &str) -> Option<Arc<AppContract>> {
        self.contracts.get(app_id).map(|entry| Arc::clone(&entry))
    }

    /// Look up a contract, erroring when absent
    ///
    /// # Errors
    /// `ContractError::AppNotFound` when no contract is registered.
    pub fn resolve(&self, app_id: &str) -> Result<Arc<AppContract>, ContractError> {
        self.get(app_id).ok_or_else(|| ContractError::AppNotFound {
            app_id: app_id.to_string(),
        })
    }

    /// All registered contracts, sorted by app id
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<AppContract>> {
        let mut all: Vec<Arc<AppContract>> = self
            .contracts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Contracts declaring the given intent
    #[must_use]
    pub fn find_by_intent(&self, intent: &str) -> Vec<Arc<AppContract>> {
        self.get_all()
            .into_iter()
            .filter(|c| c.handles_intent(intent))
            .collect()
    }

    /// Contracts allowed to run under the given context kind
    #[must_use]
    pub fn find_by_context(&self, kind: ContextKind) -> Vec<Arc<AppContract>> {
        self.get_all()
            .into_iter()
            .filter(|c| c.supports_context(kind))
            .collect()
    }

    /// Contracts declaring the given capability tag
    #[must_use]
    pub fn find_by_capability(&self, capability: &str) -> Vec<Arc<AppContract>> {
        self.get_all()
            .into_iter()
            .filter(|c| c.capabilities.iter().any(|cap| cap == capability))
            .collect()
    }

    /// Contracts marked as featured
    #[must_use]
    pub fn featured(&self) -> Vec<Arc<AppContract>> {
        self.get_all().into_iter().filter(|c| c.featured).collect()
    }

    /// Case-insensitive search over name, intents, and capabilities
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<Arc<AppContract>> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.get_all()
            .into_iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&needle)
                    || c.id.to_lowercase().contains(&needle)
                    || c.intents.iter().any(|i| i.to_lowercase().contains(&needle))
                    || c.capabilities
                        .iter()
                        .any(|cap| cap.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Number of registered contracts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}
