//! Invocation and result types

use opal_contract::ContextKind;
use serde::{Deserialize, Serialize};

/// Who is invoking, and under which platform context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    /// Acting user id
    pub user_id: String,
    /// Active context kind
    pub context_type: ContextKind,
    /// Id of the active context entity (empty for personal context)
    pub context_id: String,
}

impl CommandContext {
    /// Personal context for a user
    #[inline]
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            context_type: ContextKind::User,
            context_id: String::new(),
        }
    }

    /// Context for acting on behalf of an entity
    #[inline]
    #[must_use]
    pub fn entity(
        user_id: impl Into<String>,
        context_type: ContextKind,
        context_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            context_type,
            context_id: context_id.into(),
        }
    }
}

/// One command submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInvocation {
    /// Target app id
    pub app_id: String,
    /// Target action id
    pub action_id: String,
    /// Untyped parameter bag
    pub params: serde_json::Value,
    /// Invoker context
    pub context: CommandContext,
    /// Optional client-supplied replay key
    pub idempotency_key: Option<String>,
}

impl CommandInvocation {
    /// New invocation with an empty parameter bag
    #[must_use]
    pub fn new(
        app_id: impl Into<String>,
        action_id: impl Into<String>,
        context: CommandContext,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            action_id: action_id.into(),
            params: serde_json::Value::Object(serde_json::Map::new()),
            context,
            idempotency_key: None,
        }
    }

    /// With a parameter bag
    #[inline]
    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// With an idempotency key
    #[inline]
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Outcome of an invocation
///
/// The bus returns this for every submission; failure is data, not `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the action took effect
    pub success: bool,
    /// Adapter payload on success
    pub data: Option<serde_json::Value>,
    /// Failure message on failure
    pub error: Option<String>,
}

impl CommandResult {
    /// Successful result carrying a payload
    #[inline]
    #[must_use]
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed result carrying a message
    #[inline]
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invocation_builder() {
        let inv = CommandInvocation::new("events", "create_event", CommandContext::user("u1"))
            .with_params(json!({ "title": "Demo day" }))
            .with_idempotency_key("evt-123");

        assert_eq!(inv.app_id, "events");
        assert_eq!(inv.action_id, "create_event");
        assert_eq!(inv.idempotency_key.as_deref(), Some("evt-123"));
        assert_eq!(inv.params["title"], "Demo day");
    }

    #[test]
    fn result_constructors() {
        let ok = CommandResult::ok(json!({ "id": 1 }));
        assert!(ok.success);
        assert!(ok.error.is_none());

        let fail = CommandResult::fail("nope");
        assert!(!fail.success);
        assert_eq!(fail.error.as_deref(), Some("nope"));
        assert!(fail.data.is_none());
    }

    #[test]
    fn context_constructors() {
        let personal = CommandContext::user("u1");
        assert_eq!(personal.context_type, ContextKind::User);
        assert!(personal.context_id.is_empty());

        let farm = CommandContext::entity("u1", ContextKind::Farm, "farm-9");
        assert_eq!(farm.context_type, ContextKind::Farm);
        assert_eq!(farm.context_id, "farm-9");
    }
}
