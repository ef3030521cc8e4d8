//! Feature errors

use thiserror::Error;

/// Errors from the registry and loaders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    /// The feature id is not registered
    #[error("feature not registered: {feature_id}")]
    NotRegistered {
        /// Requested feature id
        feature_id: String,
    },
    /// The loader failed to produce a component
    #[error("feature load failed: {reason}")]
    LoadFailed {
        /// Loader-reported reason
        reason: String,
    },
}

/// A contained rendering failure
///
/// Produced either by a component returning an error or by the host
/// catching a panic at the isolation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderFault {
    /// What went wrong
    pub message: String,
}

impl RenderFault {
    /// Fault with a message
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
