//! Session policy guard
//!
//! Coarse pre-execution checks the shell runs before handing an
//! invocation to the command bus:
//! - quiet hours (wall-clock window, wraps midnight)
//! - per-user daily action cap
//! - strict ownership predicate
//!
//! The guard decides; it never executes. Quiet hours are checked before
//! the cap, so a quiet-hours denial does not consume cap budget.

use chrono::{NaiveDateTime, Timelike};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Wall-clock source, injectable for tests
pub trait Clock: Send + Sync {
    /// Current local time
    fn now(&self) -> NaiveDateTime;
}

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Clock pinned to an instant, movable through shared references
#[derive(Debug)]
pub struct FixedClock {
    now: parking_lot::Mutex<NaiveDateTime>,
}

impl FixedClock {
    /// Clock reporting the given instant
    #[must_use]
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: parking_lot::Mutex::new(now),
        }
    }

    /// Clock pinned to the given local hour on an arbitrary date
    #[must_use]
    pub fn at_hour(hour: u32) -> Self {
        let base = chrono::NaiveDate::from_ymd_opt(2026, 3, 2)
            .and_then(|d| d.and_hms_opt(hour.min(23), 0, 0))
            .unwrap_or_default();
        Self::at(base)
    }

    /// Move the clock
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Guard configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Hour the quiet window opens (inclusive)
    pub quiet_start: u32,
    /// Hour the quiet window closes (exclusive)
    pub quiet_end: u32,
    /// Actions allowed per user per calendar day
    pub daily_action_cap: u32,
}

impl PolicyConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a quiet-hours window
    #[inline]
    #[must_use]
    pub fn with_quiet_hours(mut self, start: u32, end: u32) -> Self {
        self.quiet_start = start;
        self.quiet_end = end;
        self
    }

    /// With a daily action cap
    #[inline]
    #[must_use]
    pub fn with_daily_cap(mut self, cap: u32) -> Self {
        self.daily_action_cap = cap;
        self
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            quiet_start: 22,
            quiet_end: 7,
            daily_action_cap: 100,
        }
    }
}

/// Outcome of a policy check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Whether the action may proceed
    pub allowed: bool,
    /// Denial reason when blocked
    pub reason: Option<String>,
}

impl PolicyDecision {
    /// Permit the action
    #[inline]
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Block the action with a reason
    #[inline]
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Pre-execution policy checks
pub struct PolicyGuard {
    config: PolicyConfig,
    clock: Arc<dyn Clock>,
    // key: "user_id:YYYY-MM-DD"; stale days linger until reset_daily_counts
    counters: DashMap<String, u32>,
}

impl PolicyGuard {
    /// New guard on the system clock
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// New guard with an injected clock
    #[must_use]
    pub fn with_clock(config: PolicyConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            counters: DashMap::new(),
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Whether the current hour falls inside the quiet window
    ///
    /// The window is `[quiet_start, quiet_end)`; `start > end` means it
    /// wraps midnight.
    #[must_use]
    pub fn is_quiet_hours(&self) -> bool {
        let hour = self.clock.now().hour();
        let (start, end) = (self.config.quiet_start, self.config.quiet_end);
        if start <= end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    /// Check one prospective action for a user
    ///
    /// An allowed decision consumes one unit of the user's daily cap.
    pub fn check_policy(&self, user_id: &str, action: &str) -> PolicyDecision {
        if self.is_quiet_hours() {
            tracing::debug!(user_id, action, "denied: quiet hours");
            return PolicyDecision::deny("Quiet hours active");
        }

        let key = self.counter_key(user_id);
        let mut count = self.counters.entry(key).or_insert(0);
        if *count >= self.config.daily_action_cap {
            tracing::debug!(user_id, action, count = *count, "denied: daily cap");
            return PolicyDecision::deny("Daily action cap reached");
        }
        *count += 1;
        PolicyDecision::allow()
    }

    /// Strict ownership check
    #[inline]
    #[must_use]
    pub fn check_ownership(&self, user_id: &str, resource_owner_id: &str) -> bool {
        user_id == resource_owner_id
    }

    /// Actions the user has consumed today
    #[must_use]
    pub fn actions_today(&self, user_id: &str) -> u32 {
        self.counters
            .get(&self.counter_key(user_id))
            .map_or(0, |entry| *entry)
    }

    /// Drop counters from previous days
    ///
    /// Nothing runs this automatically; callers schedule it.
    pub fn reset_daily_counts(&self) {
        let today = self.today();
        self.counters.retain(|key, _| key.ends_with(&today));
    }

    fn counter_key(&self, user_id: &str) -> String {
        format!("{}:{}", user_id, self.today())
    }

    fn today(&self) -> String {
        self.clock.now().date().format("%Y-%m-%d").to_string()
    }
}

impl std::fmt::Debug for PolicyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyGuard")
            .field("config", &self.config)
            .field("tracked_counters", &self.counters.len())
            .finish()
    }
}
