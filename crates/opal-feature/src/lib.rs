//! Feature host
//!
//! Features are independently loadable units mounted from the session's
//! `f` param. The pieces:
//! - [`FeatureRegistry`], definitions with async loaders, prop schemas,
//!   and percentage rollout gates
//! - [`FeatureHost`], mounting and rendering with per-feature fault
//!   isolation; one crashing feature never takes down its siblings
//! - prop gathering from `fx.*` params with size-guarded JSON parsing
//! - deep links and launchers for opening features from anywhere
//! - a merged metadata [`catalog`] with status ranking and gold-path
//!   validation

pub mod catalog;
pub mod component;
pub mod error;
pub mod host;
pub mod links;
pub mod props;
pub mod registry;

pub use catalog::{
    merge_catalogs, validate_gold_path, CatalogEntry, CatalogStats, FeatureStatus, GoldPathReport,
    GOLD_PATH_FEATURES,
};
pub use component::{FeatureComponent, Surface};
pub use error::{FeatureError, RenderFault};
pub use host::{FeatureHost, MountState};
pub use links::{
    build_deep_link, open_features, open_launcher, parse_feature_props, LauncherContext,
};
pub use props::{gather_props, parse_prop_value, resolve_props, MAX_PARSED_VALUE_LEN};
pub use registry::{rollout_bucket, ComponentLoader, FeatureDef, FeatureRegistry, Rollout};
