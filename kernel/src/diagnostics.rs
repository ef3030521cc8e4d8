//! Session diagnostics
//!
//! A snapshot of everything the shell currently holds, produced only
//! when the session carries the `debug` query param. Serializes to JSON
//! for inspection surfaces and the CLI.

use crate::shell::PlatformShell;
use opal_feature::MountState;
use opal_session::{ContextRef, PARAM_DEBUG};
use serde::Serialize;

/// State of one feature mount
#[derive(Debug, Clone, Serialize)]
pub struct MountDiagnostic {
    /// Feature id
    pub id: String,
    /// Mount lifecycle state
    pub state: MountState,
}

/// Point-in-time snapshot of the shell
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    /// Registered contract ids, sorted
    pub contracts: Vec<String>,
    /// Registered feature ids, sorted
    pub features: Vec<String>,
    /// Registered overlay keys, sorted
    pub overlays: Vec<String>,
    /// Feature mounts in mount order
    pub mounts: Vec<MountDiagnostic>,
    /// Whether an overlay window is open
    pub overlay_open: bool,
    /// Key of the open overlay, when any
    pub overlay_key: Option<String>,
    /// Current platform context
    pub context: ContextRef,
    /// Depth of the pushed-context trail
    pub context_depth: usize,
    /// Records in the audit ledger
    pub audit_entries: usize,
}

impl DiagnosticsReport {
    /// Snapshot the shell when diagnostics are switched on
    ///
    /// Returns `None` unless the `debug` param is present with a value
    /// other than `"0"`.
    #[must_use]
    pub fn capture(shell: &PlatformShell) -> Option<Self> {
        let flag = shell.query().get(PARAM_DEBUG)?;
        if flag == "0" {
            return None;
        }
        Some(Self::capture_unconditional(shell))
    }

    /// Snapshot the shell regardless of the `debug` param
    #[must_use]
    pub fn capture_unconditional(shell: &PlatformShell) -> Self {
        let mut contracts: Vec<String> = shell
            .contracts()
            .get_all()
            .into_iter()
            .map(|contract| contract.id.clone())
            .collect();
        contracts.sort();

        let mounts = shell
            .feature_host()
            .mount_states()
            .into_iter()
            .map(|(id, state)| MountDiagnostic { id, state })
            .collect();

        let overlay_state = shell.overlay_host().state();

        Self {
            contracts,
            features: shell.features().ids(),
            overlays: shell.overlays().keys(),
            mounts,
            overlay_open: overlay_state.is_open,
            overlay_key: overlay_state.active_key,
            context: shell.contexts().current(),
            context_depth: shell.contexts().stack_depth(),
            audit_entries: shell.ledger().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellConfig;
    use opal_test_utils::{cart_overlay, events_contract, incentives_feature};
    use pretty_assertions::assert_eq;

    fn shell_with_apps() -> PlatformShell {
        let shell = PlatformShell::new(&ShellConfig::new().with_demo_mode());
        shell.contracts().register(events_contract());
        shell.features().register(incentives_feature());
        shell.overlays().register(cart_overlay());
        shell
    }

    #[test]
    fn capture_requires_the_debug_param() {
        let shell = shell_with_apps();
        assert!(DiagnosticsReport::capture(&shell).is_none());

        shell.query().set("debug", "0");
        assert!(DiagnosticsReport::capture(&shell).is_none());

        shell.query().set("debug", "1");
        assert!(DiagnosticsReport::capture(&shell).is_some());
    }

    #[tokio::test]
    async fn report_reflects_registries_and_hosts() {
        let shell = shell_with_apps();
        shell.query().set("f", "incentives");
        shell.feature_host().mount_all().await;
        assert!(shell.overlay_host().open("cart", &[]).await);

        shell.query().set("debug", "1");
        let report = DiagnosticsReport::capture(&shell).unwrap();

        assert_eq!(report.contracts, vec!["events".to_owned()]);
        assert_eq!(report.features, vec!["incentives".to_owned()]);
        assert_eq!(report.overlays, vec!["cart".to_owned()]);
        assert_eq!(report.mounts.len(), 1);
        assert!(report.overlay_open);
        assert_eq!(report.overlay_key.as_deref(), Some("cart"));
        assert_eq!(report.context_depth, 0);
    }

    #[test]
    fn report_serializes_to_json() {
        let shell = shell_with_apps();
        let report = DiagnosticsReport::capture_unconditional(&shell);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["overlay_open"], serde_json::Value::Bool(false));
        assert!(value["contracts"].is_array());
    }
}
