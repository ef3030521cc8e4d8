//! Command bus
//!
//! The single choke point through which apps act on the platform:
//! - [`CommandBus::invoke`] resolves a contract, validates parameters,
//!   and hands execution to the bound [`AppAdapter`]
//! - duplicate submissions replay from the [`IdempotencyCache`]
//! - every invocation emits lifecycle [`BusEvent`]s and appends to an
//!   [`AuditSink`]
//!
//! `invoke` never returns `Err` and never panics; every failure mode
//! becomes a structured [`CommandResult`].

pub mod adapter;
pub mod audit;
pub mod bus;
pub mod cache;
pub mod error;
pub mod events;
pub mod types;

pub use adapter::{AdapterRegistry, AppAdapter, MockAdapter};
pub use audit::{AuditRecord, AuditSink, LedgerSink, TracingSink};
pub use bus::{CommandBus, CommandBusBuilder};
pub use cache::IdempotencyCache;
pub use error::{AdapterError, AuditError};
pub use events::{BusEvent, EventReceiver, KernelEventBus};
pub use types::{CommandContext, CommandInvocation, CommandResult};
