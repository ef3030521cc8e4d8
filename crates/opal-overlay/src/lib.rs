//! Overlay host
//!
//! Overlays are full apps opened in place over the current page, driven
//! by the session's `app` param. The pieces:
//! - [`OverlayRegistry`], configs with lazy component loaders, canonical
//!   routes, and auth/role requirements
//! - [`OverlayHost`], the state machine: open/close/dismiss, gating,
//!   route synchronization, link interception
//! - [`FocusTracker`], restoring focus across nested open/close cycles
//!
//! The `app` param is the single source of truth: setting it opens the
//! overlay, removing it closes the overlay, no matter who did either.

pub mod error;
pub mod focus;
pub mod host;
pub mod registry;
pub mod session;

pub use error::OverlayError;
pub use focus::FocusTracker;
pub use host::{
    DismissReason, OverlayEffect, OverlayHost, OverlayState, RouteSync, SWIPE_DISMISS_THRESHOLD,
};
pub use registry::{
    OverlayComponent, OverlayConfig, OverlayLoader, OverlayRegistry, OverlaySurface,
};
pub use session::{Role, Session, SessionProvider, StaticSessionProvider};
