//! Contract errors

/// Errors from contract lookup and parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// No contract registered under the app id
    #[error("App contract not found")]
    AppNotFound {
        /// Requested app id
        app_id: String,
    },

    /// Contract exists but has no such action
    #[error("Action not found in contract")]
    ActionNotFound {
        /// Owning app id
        app_id: String,
        /// Requested action id
        action_id: String,
    },

    /// Unrecognized context kind name
    #[error("unknown context kind: {0}")]
    UnknownContextKind(String),

    /// Unrecognized presentation mode name
    #[error("unknown presentation mode: {0}")]
    UnknownPresentationMode(String),

    /// Unrecognized parameter type name
    #[error("unknown param type: {0}")]
    UnknownParamType(String),
}
