//! Deep links and launchers
//!
//! Features open by writing the session's `f` and `fx.*` params. The
//! launcher table maps a semantic kind (an entry point elsewhere on the
//! platform) to a feature id plus a prop projection from the caller's
//! context.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use opal_session::{QueryState, FEATURE_PROP_PREFIX, PARAM_FEATURES, PARAM_RETURN_TO};
use std::collections::HashMap;

/// Open a set of features in one published update
///
/// `props` are `(feature_id, key, value)` triples written as
/// `fx.<feature>.<key>` params; `return_to` records where to navigate
/// once the flow completes.
pub fn open_features(
    state: &QueryState,
    feature_ids: &[&str],
    props: &[(&str, &str, &str)],
    return_to: Option<&str>,
) {
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(props.len() + 2);
    pairs.push((PARAM_FEATURES.to_owned(), feature_ids.join(",")));
    for (feature_id, key, value) in props {
        pairs.push((
            format!("{FEATURE_PROP_PREFIX}{feature_id}.{key}"),
            (*value).to_owned(),
        ));
    }
    if let Some(target) = return_to {
        pairs.push((PARAM_RETURN_TO.to_owned(), target.to_owned()));
    }
    state.set_many(pairs);
    tracing::debug!(features = %feature_ids.join(","), "features opened");
}

/// Shareable link opening the given features on a base path
#[must_use]
pub fn build_deep_link(
    base_path: &str,
    feature_ids: &[&str],
    props: &[(&str, &str, &str)],
) -> String {
    let state = QueryState::new();
    open_features(&state, feature_ids, props, None);
    format!("{base_path}?{}", state.to_query_string())
}

/// Extract the `fx.<feature_id>.*` params as raw strings, in order
#[must_use]
pub fn parse_feature_props(state: &QueryState, feature_id: &str) -> IndexMap<String, String> {
    let prefix = format!("{FEATURE_PROP_PREFIX}{feature_id}.");
    let mut props = IndexMap::new();
    for (key, value) in state.snapshot().iter() {
        if let Some(prop_key) = key.strip_prefix(&prefix) {
            if !prop_key.is_empty() {
                props.insert(prop_key.to_owned(), value.to_owned());
            }
        }
    }
    props
}

/// Context data a launcher projects props from
#[derive(Debug, Clone, Default)]
pub struct LauncherContext {
    /// Owning business, if any
    pub business_id: Option<String>,
    /// Incentive class, if any
    pub class_id: Option<String>,
    /// Horse being acted on, if any
    pub horse_id: Option<String>,
    /// Caller's role in the flow, if any
    pub role: Option<String>,
}

struct Launcher {
    feature_id: &'static str,
    props: fn(&LauncherContext) -> Vec<(String, String)>,
}

static LAUNCHERS: Lazy<HashMap<&'static str, Launcher>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(
        "incentive_entry",
        Launcher {
            feature_id: "incentives",
            props: |ctx| {
                let mut props = Vec::new();
                if let Some(class_id) = &ctx.class_id {
                    props.push(("program".to_owned(), class_id.clone()));
                }
                if let Some(horse_id) = &ctx.horse_id {
                    props.push(("horse".to_owned(), horse_id.clone()));
                }
                props.push(("mode".to_owned(), "enter".to_owned()));
                props
            },
        },
    );
    map.insert(
        "team_workspace",
        Launcher {
            feature_id: "work_packages",
            props: |ctx| {
                let mut props = Vec::new();
                if let Some(business_id) = &ctx.business_id {
                    props.push(("project".to_owned(), business_id.clone()));
                }
                if let Some(role) = &ctx.role {
                    props.push(("role".to_owned(), role.clone()));
                }
                props.push(("range".to_owned(), "week".to_owned()));
                props
            },
        },
    );
    map
});

/// Open the feature a launcher kind resolves to
///
/// Unknown kinds log a warning and change nothing. Returns whether a
/// launcher matched.
pub fn open_launcher(
    state: &QueryState,
    kind: &str,
    context: &LauncherContext,
    return_to: Option<&str>,
) -> bool {
    let Some(launcher) = LAUNCHERS.get(kind) else {
        tracing::warn!(kind, "unknown launcher kind");
        return false;
    };

    let props = (launcher.props)(context);
    let triples: Vec<(&str, &str, &str)> = props
        .iter()
        .map(|(key, value)| (launcher.feature_id, key.as_str(), value.as_str()))
        .collect();
    open_features(state, &[launcher.feature_id], &triples, return_to);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_features_writes_params() {
        let state = QueryState::new();
        open_features(
            &state,
            &["incentives", "work_packages"],
            &[("incentives", "program", "p-1")],
            Some("/dashboard"),
        );

        assert_eq!(
            state.get(PARAM_FEATURES).as_deref(),
            Some("incentives,work_packages")
        );
        assert_eq!(state.get("fx.incentives.program").as_deref(), Some("p-1"));
        assert_eq!(state.get(PARAM_RETURN_TO).as_deref(), Some("/dashboard"));
    }

    #[test]
    fn deep_link_round_trips_through_query_state() {
        let link = build_deep_link(
            "/platform",
            &["incentives"],
            &[("incentives", "program", "p-1"), ("incentives", "mode", "enter")],
        );

        let (path, query) = link.split_once('?').unwrap();
        assert_eq!(path, "/platform");

        let restored = QueryState::from_query_string(query);
        assert_eq!(restored.get(PARAM_FEATURES).as_deref(), Some("incentives"));
        let props = parse_feature_props(&restored, "incentives");
        assert_eq!(props.get("program").map(String::as_str), Some("p-1"));
        assert_eq!(props.get("mode").map(String::as_str), Some("enter"));
    }

    #[test]
    fn incentive_entry_launcher_projects_context() {
        let state = QueryState::new();
        let context = LauncherContext {
            class_id: Some("c-7".to_owned()),
            horse_id: Some("h-3".to_owned()),
            ..LauncherContext::default()
        };

        assert!(open_launcher(&state, "incentive_entry", &context, None));
        assert_eq!(state.get(PARAM_FEATURES).as_deref(), Some("incentives"));
        assert_eq!(state.get("fx.incentives.program").as_deref(), Some("c-7"));
        assert_eq!(state.get("fx.incentives.horse").as_deref(), Some("h-3"));
        assert_eq!(state.get("fx.incentives.mode").as_deref(), Some("enter"));
    }

    #[test]
    fn team_workspace_launcher_defaults_range_to_week() {
        let state = QueryState::new();
        let context = LauncherContext {
            business_id: Some("b-1".to_owned()),
            role: Some("manager".to_owned()),
            ..LauncherContext::default()
        };

        assert!(open_launcher(&state, "team_workspace", &context, None));
        assert_eq!(state.get(PARAM_FEATURES).as_deref(), Some("work_packages"));
        assert_eq!(state.get("fx.work_packages.project").as_deref(), Some("b-1"));
        assert_eq!(state.get("fx.work_packages.range").as_deref(), Some("week"));
    }

    #[test]
    fn unknown_launcher_kind_is_a_noop() {
        let state = QueryState::new();
        assert!(!open_launcher(
            &state,
            "mystery_kind",
            &LauncherContext::default(),
            None
        ));
        assert!(state.snapshot().is_empty());
    }
}
