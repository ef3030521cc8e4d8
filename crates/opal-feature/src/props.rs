//! Prop resolution
//!
//! Feature props travel as `fx.<feature>.<key>` session params. Each
//! value is JSON-parsed with guard rails:
//! - values over [`MAX_PARSED_VALUE_LEN`] chars stay opaque strings
//! - parse failures fall back to the raw string
//! - parsed objects are shallow-cloned into a fresh map, keeping only
//!   their own key/value entries
//!
//! The merged bag is validated against the feature's schema; violations
//! soft-fail to the declared defaults.

use crate::registry::FeatureDef;
use opal_session::{QueryState, FEATURE_PROP_PREFIX};
use serde_json::{Map, Value};

/// Longest param value the parser will look at
pub const MAX_PARSED_VALUE_LEN: usize = 1000;

/// Interpret one raw param value
#[must_use]
pub fn parse_prop_value(raw: &str) -> Value {
    if raw.len() > MAX_PARSED_VALUE_LEN {
        return Value::String(raw.to_owned());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(obj)) => {
            let mut own = Map::with_capacity(obj.len());
            for (key, value) in obj {
                own.insert(key, value);
            }
            Value::Object(own)
        }
        Ok(parsed) => parsed,
        Err(_) => Value::String(raw.to_owned()),
    }
}

/// Collect and parse every `fx.<feature_id>.<key>` param
#[must_use]
pub fn gather_props(state: &QueryState, feature_id: &str) -> Map<String, Value> {
    let prefix = format!("{FEATURE_PROP_PREFIX}{feature_id}.");
    let mut props = Map::new();
    for (key, value) in state.snapshot().iter() {
        if let Some(prop_key) = key.strip_prefix(&prefix) {
            if !prop_key.is_empty() {
                props.insert(prop_key.to_owned(), parse_prop_value(value));
            }
        }
    }
    props
}

/// Resolve the prop bag for a feature
///
/// Defaults are applied first, then session params on top. When the
/// merged bag violates the schema, the whole bag is discarded in favor
/// of the defaults alone.
#[must_use]
pub fn resolve_props(def: &FeatureDef, state: &QueryState) -> Map<String, Value> {
    let mut merged = def.defaults.clone();
    for (key, value) in gather_props(state, &def.id) {
        merged.insert(key, value);
    }

    if let Err(violations) = def.schema.validate(&Value::Object(merged.clone())) {
        tracing::debug!(
            feature_id = %def.id,
            violations = violations.len(),
            "props failed schema validation, using defaults"
        );
        return def.defaults.clone();
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{FeatureComponent, Surface};
    use crate::error::RenderFault;
    use crate::registry::ComponentLoader;
    use opal_contract::{ParamSchema, ParamType};
    use serde_json::json;
    use std::sync::Arc;

    struct Stub;

    impl FeatureComponent for Stub {
        fn render(&self, _props: &Map<String, Value>) -> Result<Surface, RenderFault> {
            Ok(Surface::new("stub"))
        }
    }

    fn stub_loader() -> ComponentLoader {
        Arc::new(|| Box::pin(async { Ok(Box::new(Stub) as Box<dyn FeatureComponent>) }))
    }

    #[test]
    fn parses_json_scalars() {
        assert_eq!(parse_prop_value("42"), json!(42));
        assert_eq!(parse_prop_value("true"), json!(true));
        assert_eq!(parse_prop_value("\"quoted\""), json!("quoted"));
    }

    #[test]
    fn parse_failure_falls_back_to_raw_string() {
        assert_eq!(parse_prop_value("p-123"), json!("p-123"));
        assert_eq!(parse_prop_value("{broken"), json!("{broken"));
    }

    #[test]
    fn oversized_values_stay_opaque() {
        let raw = format!("[{}]", "1,".repeat(600));
        assert!(raw.len() > MAX_PARSED_VALUE_LEN);
        assert_eq!(parse_prop_value(&raw), Value::String(raw.clone()));
    }

    #[test]
    fn objects_are_shallow_cloned() {
        let parsed = parse_prop_value(r#"{"a": 1, "b": {"c": 2}}"#);
        assert_eq!(parsed, json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn gather_props_slices_by_prefix() {
        let state = QueryState::new();
        state.set("fx.incentives.program", "p-1");
        state.set("fx.incentives.count", "3");
        state.set("fx.other.program", "p-9");
        state.set("app", "cart");

        let props = gather_props(&state, "incentives");
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("program"), Some(&json!("p-1")));
        assert_eq!(props.get("count"), Some(&json!(3)));
    }

    #[test]
    fn resolve_merges_defaults_under_params() {
        let mut defaults = Map::new();
        defaults.insert("mode".to_owned(), json!("view"));
        defaults.insert("range".to_owned(), json!("week"));
        let def = FeatureDef::new("incentives", "Incentives", stub_loader())
            .with_defaults(defaults);

        let state = QueryState::new();
        state.set("fx.incentives.mode", "\"enter\"");

        let props = resolve_props(&def, &state);
        assert_eq!(props.get("mode"), Some(&json!("enter")));
        assert_eq!(props.get("range"), Some(&json!("week")));
    }

    #[test]
    fn schema_violation_soft_fails_to_defaults() {
        let mut defaults = Map::new();
        defaults.insert("count".to_owned(), json!(1));
        let def = FeatureDef::new("incentives", "Incentives", stub_loader())
            .with_schema(ParamSchema::new().required("count", ParamType::Number))
            .with_defaults(defaults);

        let state = QueryState::new();
        state.set("fx.incentives.count", "\"not-a-number\"");

        let props = resolve_props(&def, &state);
        assert_eq!(props.get("count"), Some(&json!(1)));
    }
}
