//! Session state
//!
//! Two services every host shares:
//! - [`QueryState`], the ordered key-value session state carrying the
//!   platform's navigation contract (`app`, `f`, `fx.*`, `return_to`,
//!   `debug`); observable, diffable, and round-trippable through a
//!   query-string codec
//! - [`ContextManager`], the stack machine tracking which platform
//!   context (user, business, farm, ...) the session acts under

pub mod context;
pub mod query_state;

pub use context::{ContextEvent, ContextManager, ContextRef};
pub use query_state::{
    QueryState, QueryStateDiff, QueryStateSnapshot, SyncGuard, FEATURE_PROP_PREFIX, PARAM_APP,
    PARAM_DEBUG, PARAM_FEATURES, PARAM_RETURN_TO,
};
