//! Overlay errors

use thiserror::Error;

/// Errors from the registry and loaders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    /// The overlay key is not registered
    #[error("unknown overlay key: {key}")]
    UnknownKey {
        /// Requested key
        key: String,
    },
    /// The loader failed to produce a component
    #[error("overlay load failed: {reason}")]
    LoadFailed {
        /// Loader-reported reason
        reason: String,
    },
}
