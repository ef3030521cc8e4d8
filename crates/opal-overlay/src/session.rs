//! Session roles
//!
//! The host never owns auth mechanics; it asks a [`SessionProvider`]
//! for the caller's identity and role when a gate needs checking.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Platform role, weakest first
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unauthenticated visitor
    #[default]
    Guest,
    /// Signed-in user
    User,
    /// Member of the active entity
    Member,
    /// Administrator of the active entity
    Admin,
}

impl Role {
    /// Numeric rank for gate comparisons
    #[inline]
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::Guest => 0,
            Self::User => 1,
            Self::Member => 2,
            Self::Admin => 3,
        }
    }

    /// Whether this role satisfies a required one
    #[inline]
    #[must_use]
    pub fn satisfies(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Guest => "guest",
            Self::User => "user",
            Self::Member => "member",
            Self::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// Caller identity at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Signed-in user id, if any
    pub user_id: Option<String>,
    /// Effective role
    pub role: Role,
}

impl Session {
    /// Anonymous session
    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Signed-in session with a role
    #[must_use]
    pub fn signed_in(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: Some(user_id.into()),
            role,
        }
    }
}

/// Source of the current session
pub trait SessionProvider: Send + Sync {
    /// Current session
    fn session(&self) -> Session;
}

/// Provider holding a mutable session, for wiring and tests
#[derive(Debug, Default)]
pub struct StaticSessionProvider {
    session: Mutex<Session>,
}

impl StaticSessionProvider {
    /// Provider starting from the given session
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    /// Replace the session
    pub fn set(&self, session: Session) {
        *self.session.lock() = session;
    }
}

impl SessionProvider for StaticSessionProvider {
    fn session(&self) -> Session {
        self.session.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ranks_are_ordered() {
        assert!(Role::Guest < Role::User);
        assert!(Role::User < Role::Member);
        assert!(Role::Member < Role::Admin);
        assert_eq!(Role::Admin.rank(), 3);
    }

    #[test]
    fn satisfies_compares_ranks() {
        assert!(Role::Admin.satisfies(Role::Member));
        assert!(Role::Member.satisfies(Role::Member));
        assert!(!Role::User.satisfies(Role::Member));
    }

    #[test]
    fn static_provider_replaces_session() {
        let provider = StaticSessionProvider::default();
        assert_eq!(provider.session(), Session::anonymous());

        provider.set(Session::signed_in("u1", Role::Member));
        assert_eq!(provider.session().user_id.as_deref(), Some("u1"));
        assert_eq!(provider.session().role, Role::Member);
    }
}
