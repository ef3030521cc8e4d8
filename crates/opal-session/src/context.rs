//! Platform context stack machine
//!
//! A session always acts under exactly one context. Direct switches
//! replace the current context; push/pop maintain a LIFO trail so
//! nested flows (open a farm from a business, then a stallion from the
//! farm) can unwind in reverse order.

use opal_contract::ContextKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One platform context: a kind plus the entity id it refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRef {
    /// Context kind
    pub kind: ContextKind,
    /// Entity id (empty for the personal context)
    pub id: String,
}

impl ContextRef {
    /// Context for an entity
    #[inline]
    #[must_use]
    pub fn new(kind: ContextKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// The initial personal context
    #[inline]
    #[must_use]
    pub fn personal() -> Self {
        Self {
            kind: ContextKind::User,
            id: String::new(),
        }
    }
}

impl std::fmt::Display for ContextRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}:{}", self.kind, self.id)
        }
    }
}

/// Context transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextEvent {
    /// Direct switch; the stack was untouched
    Switched {
        /// Context before the switch
        previous: ContextRef,
        /// Context after the switch
        current: ContextRef,
    },
    /// Previous context saved on the stack, new one activated
    Pushed {
        /// Context saved on the stack
        saved: ContextRef,
        /// Newly active context
        current: ContextRef,
    },
    /// Top of the stack restored
    Popped {
        /// Context that was left
        left: ContextRef,
        /// Restored context
        restored: ContextRef,
    },
}

struct StackState {
    current: ContextRef,
    stack: Vec<ContextRef>,
}

/// Tracks the active context and its LIFO trail
///
/// The stack only grows through [`ContextManager::push_context`] and
/// only shrinks through [`ContextManager::pop_context`].
pub struct ContextManager {
    state: Mutex<StackState>,
    events: broadcast::Sender<ContextEvent>,
}

impl ContextManager {
    /// New manager starting in the personal context with an empty stack
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(StackState {
                current: ContextRef::personal(),
                stack: Vec::new(),
            }),
            events,
        }
    }

    /// Currently active context
    #[must_use]
    pub fn current(&self) -> ContextRef {
        self.state.lock().current.clone()
    }

    /// Depth of the saved trail
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.state.lock().stack.len()
    }

    /// Subscribe to context transitions
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    /// Switch directly, leaving the stack untouched
    pub fn set_context(&self, context: ContextRef) {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.current, context.clone())
        };
        tracing::debug!(from = %previous, to = %context, "context switched");
        let _ = self.events.send(ContextEvent::Switched {
            previous,
            current: context,
        });
    }

    /// Save the current context on the stack and activate a new one
    pub fn push_context(&self, context: ContextRef) {
        let saved = {
            let mut state = self.state.lock();
            let saved = std::mem::replace(&mut state.current, context.clone());
            state.stack.push(saved.clone());
            saved
        };
        tracing::debug!(saved = %saved, to = %context, "context pushed");
        let _ = self.events.send(ContextEvent::Pushed {
            saved,
            current: context,
        });
    }

    /// Restore the most recently pushed context
    ///
    /// Returns the restored context, or `None` when the stack is empty
    /// (the current context is left as is).
    pub fn pop_context(&self) -> Option<ContextRef> {
        let (left, restored) = {
            let mut state = self.state.lock();
            let restored = state.stack.pop()?;
            let left = std::mem::replace(&mut state.current, restored.clone());
            (left, restored)
        };
        tracing::debug!(left = %left, restored = %restored, "context popped");
        let _ = self.events.send(ContextEvent::Popped {
            left,
            restored: restored.clone(),
        });
        Some(restored)
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ContextManager")
            .field("current", &state.current)
            .field("stack_depth", &state.stack.len())
            .finish()
    }
}
