//! Feature metadata catalog
//!
//! Catalog entries arrive from several sources (base, overlays,
//! generated backfills) and are merged by id: the stronger build status
//! wins and array fields are unioned. The gold path names the features
//! a release cannot ship without.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Build status of a catalog entry, weakest first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureStatus {
    /// Placeholder UI only
    Shell,
    /// Complete UI, not yet wired to live data
    FullUi,
    /// Fully wired end to end
    Wired,
}

impl FeatureStatus {
    /// Merge precedence rank
    #[inline]
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::Shell => 0,
            Self::FullUi => 1,
            Self::Wired => 2,
        }
    }

    /// Canonical name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::FullUi => "full-ui",
            Self::Wired => "wired",
        }
    }
}

impl std::fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable feature id
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Platform area the feature belongs to
    pub area: String,
    /// Build status
    pub status: FeatureStatus,
    /// Routes the feature serves
    #[serde(default)]
    pub routes: Vec<String>,
    /// UI components it owns
    #[serde(default)]
    pub components: Vec<String>,
    /// Backend calls it makes
    #[serde(default)]
    pub rpc: Vec<String>,
    /// Flags gating it
    #[serde(default)]
    pub flags: Vec<String>,
    /// Test suites covering it
    #[serde(default)]
    pub tests: Vec<String>,
    /// Whether docs exist
    #[serde(default)]
    pub has_docs: bool,
    /// Owning team or person
    #[serde(default)]
    pub owner: Option<String>,
}

impl CatalogEntry {
    /// Entry with the given identity and status
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        area: impl Into<String>,
        status: FeatureStatus,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            area: area.into(),
            status,
            routes: Vec::new(),
            components: Vec::new(),
            rpc: Vec::new(),
            flags: Vec::new(),
            tests: Vec::new(),
            has_docs: false,
            owner: None,
        }
    }

    /// With routes
    #[must_use]
    pub fn with_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes = routes.into_iter().map(Into::into).collect();
        self
    }

    /// With test suites
    #[must_use]
    pub fn with_tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tests = tests.into_iter().map(Into::into).collect();
        self
    }

    /// With an owner
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// With docs marked present
    #[must_use]
    pub fn with_docs(mut self) -> Self {
        self.has_docs = true;
        self
    }
}

/// Features a release cannot ship without
pub const GOLD_PATH_FEATURES: &[&str] = &[
    "profile_pins",
    "favorites",
    "reposts",
    "linked_accounts",
    "entity_edges",
    "composer_core",
    "composer_crosspost",
    "composer_schedule",
    "notification_lanes",
    "notification_prefs",
    "notification_digest",
    "events_discounts",
    "events_waitlist",
    "producer_console_overview",
    "producer_registrations",
    "producer_financials",
    "producer_export_csv",
    "earnings_tiers",
    "earnings_missed",
    "orders_refund_flow",
];

/// Merge catalog sources in precedence order
///
/// The first occurrence of an id seeds the entry with de-duplicated
/// arrays; later occurrences may update title/area/owner/docs, the
/// stronger status wins, and array fields are unioned. The result is
/// sorted by id.
#[must_use]
pub fn merge_catalogs(sources: &[Vec<CatalogEntry>]) -> Vec<CatalogEntry> {
    let mut merged: BTreeMap<String, CatalogEntry> = BTreeMap::new();

    for source in sources {
        for entry in source {
            match merged.get_mut(&entry.id) {
                None => {
                    let mut seeded = entry.clone();
                    dedup_in_place(&mut seeded.routes);
                    dedup_in_place(&mut seeded.components);
                    dedup_in_place(&mut seeded.rpc);
                    dedup_in_place(&mut seeded.flags);
                    dedup_in_place(&mut seeded.tests);
                    merged.insert(entry.id.clone(), seeded);
                }
                Some(prev) => {
                    prev.title = entry.title.clone();
                    prev.area = entry.area.clone();
                    if entry.status.rank() > prev.status.rank() {
                        prev.status = entry.status;
                    }
                    union_into(&mut prev.routes, &entry.routes);
                    union_into(&mut prev.components, &entry.components);
                    union_into(&mut prev.rpc, &entry.rpc);
                    union_into(&mut prev.flags, &entry.flags);
                    union_into(&mut prev.tests, &entry.tests);
                    prev.has_docs = prev.has_docs || entry.has_docs;
                    if entry.owner.is_some() {
                        prev.owner = entry.owner.clone();
                    }
                }
            }
        }
    }

    merged.into_values().collect()
}

fn dedup_in_place(values: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    values.retain(|v| seen.insert(v.clone()));
}

fn union_into(target: &mut Vec<String>, incoming: &[String]) {
    for value in incoming {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

/// Result of checking the gold path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldPathReport {
    /// Whether every gold-path feature is present and past shell
    pub ready: bool,
    /// Ids that are missing or still shells
    pub blocking: Vec<String>,
}

/// Check the catalog against the gold path
///
/// A feature blocks when it is absent or still [`FeatureStatus::Shell`].
#[must_use]
pub fn validate_gold_path(catalog: &[CatalogEntry]) -> GoldPathReport {
    let mut blocking = Vec::new();
    for id in GOLD_PATH_FEATURES {
        let ok = catalog
            .iter()
            .any(|entry| entry.id == *id && entry.status != FeatureStatus::Shell);
        if !ok {
            blocking.push((*id).to_owned());
        }
    }
    GoldPathReport {
        ready: blocking.is_empty(),
        blocking,
    }
}

/// Aggregate catalog statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Number of entries
    pub total: usize,
    /// Entry counts by status name
    pub by_status: BTreeMap<String, usize>,
    /// Entry counts by area
    pub by_area: BTreeMap<String, usize>,
    /// Share of entries past shell, as a percentage
    pub completion_percent: f64,
    /// Entries with at least one test suite
    pub with_tests: usize,
    /// Entries with docs
    pub with_docs: usize,
    /// Entries with an owner
    pub with_owner: usize,
}

impl CatalogStats {
    /// Compute stats over a catalog
    #[must_use]
    pub fn compute(catalog: &[CatalogEntry]) -> Self {
        let total = catalog.len();
        let mut by_status = BTreeMap::new();
        let mut by_area = BTreeMap::new();
        let mut complete = 0usize;

        for entry in catalog {
            *by_status.entry(entry.status.name().to_owned()).or_insert(0) += 1;
            *by_area.entry(entry.area.clone()).or_insert(0) += 1;
            if entry.status != FeatureStatus::Shell {
                complete += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let completion_percent = (complete as f64 / total.max(1) as f64) * 100.0;

        Self {
            total,
            by_status,
            by_area,
            completion_percent,
            with_tests: catalog.iter().filter(|e| !e.tests.is_empty()).count(),
            with_docs: catalog.iter().filter(|e| e.has_docs).count(),
            with_owner: catalog.iter().filter(|e| e.owner.is_some()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, status: FeatureStatus) -> CatalogEntry {
        CatalogEntry::new(id, id.to_uppercase(), "events", status)
    }

    #[test]
    fn status_ordering_matches_rank() {
        assert!(FeatureStatus::Shell < FeatureStatus::FullUi);
        assert!(FeatureStatus::FullUi < FeatureStatus::Wired);
        assert_eq!(FeatureStatus::Wired.rank(), 2);
    }

    #[test]
    fn merge_keeps_stronger_status() {
        let base = vec![entry("favorites", FeatureStatus::Wired)];
        let overlay = vec![entry("favorites", FeatureStatus::Shell)];

        let merged = merge_catalogs(&[base, overlay]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, FeatureStatus::Wired);
    }

    #[test]
    fn merge_unions_array_fields() {
        let base = vec![entry("favorites", FeatureStatus::Shell)
            .with_routes(["/favorites", "/favorites/:id"])];
        let overlay =
            vec![entry("favorites", FeatureStatus::FullUi).with_routes(["/favorites", "/saved"])];

        let merged = merge_catalogs(&[base, overlay]);
        assert_eq!(
            merged[0].routes,
            vec!["/favorites", "/favorites/:id", "/saved"]
        );
        assert_eq!(merged[0].status, FeatureStatus::FullUi);
    }

    #[test]
    fn merge_sorts_by_id_and_dedups_first_occurrence() {
        let source = vec![
            entry("reposts", FeatureStatus::Shell).with_routes(["/r", "/r"]),
            entry("favorites", FeatureStatus::Shell),
        ];

        let merged = merge_catalogs(&[source]);
        assert_eq!(merged[0].id, "favorites");
        assert_eq!(merged[1].id, "reposts");
        assert_eq!(merged[1].routes, vec!["/r"]);
    }

    #[test]
    fn gold_path_blocks_missing_and_shell_entries() {
        let catalog: Vec<CatalogEntry> = GOLD_PATH_FEATURES
            .iter()
            .skip(1)
            .map(|id| entry(id, FeatureStatus::Wired))
            .collect();
        let mut catalog = catalog;
        // Downgrade one present feature to a shell.
        catalog[0].status = FeatureStatus::Shell;

        let report = validate_gold_path(&catalog);
        assert!(!report.ready);
        assert!(report.blocking.contains(&GOLD_PATH_FEATURES[0].to_owned()));
        assert!(report.blocking.contains(&catalog[0].id));
        assert_eq!(report.blocking.len(), 2);
    }

    #[test]
    fn gold_path_ready_when_all_past_shell() {
        let catalog: Vec<CatalogEntry> = GOLD_PATH_FEATURES
            .iter()
            .map(|id| entry(id, FeatureStatus::FullUi))
            .collect();

        let report = validate_gold_path(&catalog);
        assert!(report.ready);
        assert!(report.blocking.is_empty());
    }

    #[test]
    fn stats_counts_and_completion() {
        let catalog = vec![
            entry("a", FeatureStatus::Wired).with_tests(["a_test"]).with_docs(),
            entry("b", FeatureStatus::FullUi).with_owner("platform"),
            entry("c", FeatureStatus::Shell),
            CatalogEntry::new("d", "D", "orders", FeatureStatus::Wired),
        ];

        let stats = CatalogStats::compute(&catalog);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status.get("wired"), Some(&2));
        assert_eq!(stats.by_status.get("shell"), Some(&1));
        assert_eq!(stats.by_area.get("events"), Some(&3));
        assert_eq!(stats.by_area.get("orders"), Some(&1));
        assert!((stats.completion_percent - 75.0).abs() < f64::EPSILON);
        assert_eq!(stats.with_tests, 1);
        assert_eq!(stats.with_docs, 1);
        assert_eq!(stats.with_owner, 1);
    }

    #[test]
    fn stats_on_empty_catalog_avoids_division_by_zero() {
        let stats = CatalogStats::compute(&[]);
        assert_eq!(stats.total, 0);
        assert!((stats.completion_percent - 0.0).abs() < f64::EPSILON);
    }
}
