//! Reconciliation engine: pairs board records with issue-tracker records,
//! partitions them into actionable categories and plans the write-back.

pub mod classifier;
pub mod options;
pub mod plan;
pub mod reconcile;
pub mod reference;
pub mod resolver;
pub mod scope;

pub use classifier::{
    classify, exclude_ignored_issues, ClassifyContext, READY_FOR_STAGE_EXPECTED,
};
pub use options::{
    ReconcileOptions, ResolverConfig, DEFAULT_DISPLAY_ONLY_BUCKETS, DEFAULT_REFERENCE_LABELS,
    DEFAULT_SELECTED_BUCKETS, DEFAULT_SYNCABLE_BUCKETS,
};
pub use plan::{
    default_state_map, plan_sync_actions, CreateIssuePlan, SkippedAction, SyncAction, SyncPlan,
    SyncPlanOptions, UpdateIssueStatePlan,
};
pub use reconcile::{reconcile, ReconcileInput};
pub use reference::{extract_reference, normalize_title};
pub use resolver::{resolve, ResolvedPair, Resolution};
pub use scope::{select_scope, Placement, ScopedSnapshot};
