//! App contracts and the contract registry
//!
//! Apps describe themselves to the command bus through declarative
//! [`AppContract`] records:
//! - intents the app can handle
//! - actions with coarse parameter schemas and permission lists
//! - events the app may emit
//! - contexts the app is allowed to run under
//!
//! Contracts are plain data. Registration performs no shape validation;
//! parameter bags are checked at invocation time by [`ParamSchema::validate`].

pub mod contract;
pub mod error;
pub mod registry;
pub mod schema;

pub use contract::{
    ActionSpec, AppContract, AppContractBuilder, ContextKind, DisplayHints, EventSpec,
    PresentationMode,
};
pub use error::ContractError;
pub use registry::ContractRegistry;
pub use schema::{ParamSchema, ParamSpec, ParamType, ParamViolation};
