//! Collaborator contracts for the two trackers, the mapping store and the
//! ignore list, plus the providers that satisfy them.

pub mod factory;
pub mod interface;
pub mod providers;

pub use factory::{
    build_mapping_store, build_tracker_a, build_tracker_b, resolve_provider_kind,
    supported_provider_keys, ProviderSettings,
};
pub use interface::{
    CreateIssueRequest, IgnoreList, MappingStore, TrackerASource, TrackerBSource,
    TrackerProviderError, TrackerProviderKind, TrackerSide, UpdateIssueStateRequest,
};
pub use providers::memory::{MemoryIgnoreList, MemoryMappingStore, MemoryTrackerA, MemoryTrackerB};
pub use providers::snapshot::{
    SnapshotIgnoreList, SnapshotMappingStore, SnapshotTrackerA, SnapshotTrackerB,
};
pub use tracksync_domain::CoreError;
