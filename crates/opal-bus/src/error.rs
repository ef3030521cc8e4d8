//! Bus errors

/// Errors an adapter may surface during execution
///
/// Always caught at the bus boundary and converted into a failed
/// [`crate::CommandResult`]; callers of the bus never see this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// Backing system rejected the action
    #[error("action rejected: {0}")]
    Rejected(String),

    /// Backing system is unreachable or misbehaving
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Adapter received an action it does not implement
    #[error("unsupported action: {app_id}.{action_id}")]
    UnsupportedAction {
        /// App id
        app_id: String,
        /// Action id
        action_id: String,
    },
}

/// Errors from audit sinks
///
/// Swallowed by the bus (logged, never propagated to the invoker).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// A recomputed hash did not match the stored chain
    #[error("audit ledger integrity violation at entry {index}")]
    IntegrityViolation {
        /// Index of the first bad entry
        index: usize,
    },

    /// Sink could not persist the record
    #[error("audit append failed: {0}")]
    AppendFailed(String),
}
