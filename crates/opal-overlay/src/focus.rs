//! Focus restoration
//!
//! Opening an overlay steals focus; closing it must give focus back to
//! whatever had it. A stack makes this hold for arbitrary open/close
//! nesting.

use parking_lot::Mutex;

#[derive(Default)]
struct FocusState {
    current: Option<String>,
    saved: Vec<String>,
}

/// Tracks the focused element id across overlay transitions
#[derive(Default)]
pub struct FocusTracker {
    state: Mutex<FocusState>,
}

impl FocusTracker {
    /// Tracker with nothing focused
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently focused element id
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.state.lock().current.clone()
    }

    /// Depth of the saved stack
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.lock().saved.len()
    }

    /// Move focus to an element
    pub fn focus(&self, element_id: impl Into<String>) {
        self.state.lock().current = Some(element_id.into());
    }

    /// Save the current focus and move it to a new element
    ///
    /// When nothing was focused, an empty marker is saved so the stack
    /// stays balanced.
    pub fn capture_and_focus(&self, element_id: impl Into<String>) {
        let mut state = self.state.lock();
        let previous = state.current.take().unwrap_or_default();
        state.saved.push(previous);
        state.current = Some(element_id.into());
    }

    /// Restore the most recently saved focus
    ///
    /// Returns the restored element id, or `None` when the stack is
    /// empty (focus is left as is).
    pub fn restore(&self) -> Option<String> {
        let mut state = self.state.lock();
        let saved = state.saved.pop()?;
        if saved.is_empty() {
            state.current = None;
            Some(String::new())
        } else {
            state.current = Some(saved.clone());
            Some(saved)
        }
    }
}

impl std::fmt::Debug for FocusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FocusTracker")
            .field("current", &state.current)
            .field("depth", &state.saved.len())
            .finish()
    }
}
