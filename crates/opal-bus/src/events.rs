//! Lifecycle event bus
//!
//! Every invocation publishes [`BusEvent`]s to a broadcast channel.
//! Subscribers come and go freely; a lagging receiver drops old events
//! rather than stalling the bus.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle events emitted by the command bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BusEvent {
    /// Invocation accepted and about to execute
    Invoked {
        /// Target app
        app_id: String,
        /// Target action
        action_id: String,
        /// Acting user
        user_id: String,
    },
    /// Adapter reported success
    Succeeded {
        /// Target app
        app_id: String,
        /// Target action
        action_id: String,
    },
    /// Invocation failed (resolution, execution, or adapter error)
    Failed {
        /// Target app
        app_id: String,
        /// Target action
        action_id: String,
        /// Failure message
        error: String,
    },
    /// Parameter bag violated the action schema
    ValidationFailed {
        /// Target app
        app_id: String,
        /// Target action
        action_id: String,
        /// Joined violation message
        message: String,
    },
    /// Duplicate submission answered from the idempotency cache
    IdempotentReplay {
        /// Target app
        app_id: String,
        /// Target action
        action_id: String,
        /// Replay key
        key: String,
    },
}

impl BusEvent {
    /// App id the event concerns
    #[inline]
    #[must_use]
    pub fn app_id(&self) -> &str {
        match self {
            BusEvent::Invoked { app_id, .. }
            | BusEvent::Succeeded { app_id, .. }
            | BusEvent::Failed { app_id, .. }
            | BusEvent::ValidationFailed { app_id, .. }
            | BusEvent::IdempotentReplay { app_id, .. } => app_id,
        }
    }
}

/// Receiver half of the event bus
pub type EventReceiver = broadcast::Receiver<BusEvent>;

/// Broadcast channel for bus lifecycle events
#[derive(Debug, Clone)]
pub struct KernelEventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl KernelEventBus {
    /// New bus with the given channel capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to future events
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Publish an event; dropped silently when nobody listens
    pub fn emit(&self, event: BusEvent) {
        let _ = self.sender.send(event);
    }

    /// Current subscriber count
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for KernelEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
