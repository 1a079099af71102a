use std::path::PathBuf;
use std::sync::Arc;

use crate::interface::{
    MappingStore, TrackerASource, TrackerBSource, TrackerProviderError, TrackerProviderKind,
    TrackerSide,
};
use crate::providers::memory::{MemoryMappingStore, MemoryTrackerA, MemoryTrackerB};
use crate::providers::snapshot::{SnapshotMappingStore, SnapshotTrackerA, SnapshotTrackerB};

const SUPPORTED_PROVIDER_KEYS: [&str; 4] = [
    TrackerProviderKind::BoardSnapshot.as_key(),
    TrackerProviderKind::BoardMemory.as_key(),
    TrackerProviderKind::IssueSnapshot.as_key(),
    TrackerProviderKind::IssueMemory.as_key(),
];

/// Inputs shared by every provider constructor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderSettings {
    pub snapshot_dir: PathBuf,
}

pub fn supported_provider_keys() -> &'static [&'static str] {
    &SUPPORTED_PROVIDER_KEYS
}

pub fn resolve_provider_kind(
    provider_key: &str,
) -> Result<TrackerProviderKind, TrackerProviderError> {
    TrackerProviderKind::from_key(provider_key)
        .ok_or_else(|| TrackerProviderError::UnknownProviderKey(provider_key.to_owned()))
}

fn resolve_for_side(
    provider_key: &str,
    side: TrackerSide,
) -> Result<TrackerProviderKind, TrackerProviderError> {
    let kind = resolve_provider_kind(provider_key)?;
    if kind.side() != side {
        return Err(TrackerProviderError::WrongTracker {
            key: provider_key.to_owned(),
            expected: side.namespace(),
        });
    }
    Ok(kind)
}

fn require_snapshot_dir(settings: &ProviderSettings) -> Result<PathBuf, TrackerProviderError> {
    if settings.snapshot_dir.as_os_str().is_empty() {
        return Err(TrackerProviderError::ProviderInitialization(
            "snapshot providers need a snapshot directory".to_owned(),
        ));
    }
    Ok(settings.snapshot_dir.clone())
}

pub fn build_tracker_a(
    provider_key: &str,
    settings: &ProviderSettings,
) -> Result<Arc<dyn TrackerASource>, TrackerProviderError> {
    let provider: Arc<dyn TrackerASource> = match resolve_for_side(provider_key, TrackerSide::Board)? {
        TrackerProviderKind::BoardSnapshot => {
            Arc::new(SnapshotTrackerA::new(require_snapshot_dir(settings)?))
        }
        _ => Arc::new(MemoryTrackerA::new()),
    };
    Ok(provider)
}

pub fn build_tracker_b(
    provider_key: &str,
    settings: &ProviderSettings,
) -> Result<Arc<dyn TrackerBSource>, TrackerProviderError> {
    let provider: Arc<dyn TrackerBSource> =
        match resolve_for_side(provider_key, TrackerSide::Issues)? {
            TrackerProviderKind::IssueSnapshot => {
                Arc::new(SnapshotTrackerB::new(require_snapshot_dir(settings)?))
            }
            _ => Arc::new(MemoryTrackerB::new()),
        };
    Ok(provider)
}

/// Mappings live next to the issues they point at: a snapshot issue
/// tracker gets a snapshot mapping store, a memory one gets a memory store.
pub fn build_mapping_store(
    tracker_b_key: &str,
    settings: &ProviderSettings,
) -> Result<Arc<dyn MappingStore>, TrackerProviderError> {
    let store: Arc<dyn MappingStore> = match resolve_for_side(tracker_b_key, TrackerSide::Issues)? {
        TrackerProviderKind::IssueSnapshot => {
            Arc::new(SnapshotMappingStore::new(require_snapshot_dir(settings)?))
        }
        _ => Arc::new(MemoryMappingStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::{
        build_mapping_store, build_tracker_a, build_tracker_b, resolve_provider_kind,
        supported_provider_keys, ProviderSettings, SUPPORTED_PROVIDER_KEYS,
    };
    use crate::interface::{MappingStore, TrackerProviderError, TrackerProviderKind};

    fn settings() -> ProviderSettings {
        ProviderSettings {
            snapshot_dir: "/tmp/tracksync-snapshots".into(),
        }
    }

    #[test]
    fn supported_provider_keys_are_namespaced() {
        assert_eq!(supported_provider_keys(), &SUPPORTED_PROVIDER_KEYS);
        assert!(supported_provider_keys()
            .iter()
            .all(|key| key.starts_with("tracker_a.") || key.starts_with("tracker_b.")));
    }

    #[test]
    fn supported_provider_keys_roundtrip_through_kind_resolution() {
        for key in supported_provider_keys() {
            let kind = resolve_provider_kind(key).expect("resolve key");
            assert_eq!(kind.as_key(), *key);
        }
    }

    #[test]
    fn resolve_provider_kind_rejects_unknown_keys() {
        let error = resolve_provider_kind("snapshot").expect_err("reject bare key");
        assert_eq!(error.to_string(), "unknown tracker provider key: snapshot");
    }

    #[test]
    fn builders_return_providers_for_their_own_tracker() {
        let board = build_tracker_a("tracker_a.snapshot", &settings()).expect("board");
        assert_eq!(board.kind(), TrackerProviderKind::BoardSnapshot);
        let issues = build_tracker_b("tracker_b.memory", &settings()).expect("issues");
        assert_eq!(issues.provider_key(), "tracker_b.memory");
    }

    #[test]
    fn builders_reject_keys_for_the_other_tracker() {
        let error = build_tracker_a("tracker_b.snapshot", &settings())
            .err()
            .expect("wrong tracker");
        assert_eq!(
            error,
            TrackerProviderError::WrongTracker {
                key: "tracker_b.snapshot".to_owned(),
                expected: "tracker_a",
            }
        );
    }

    #[test]
    fn snapshot_providers_need_a_directory() {
        let error = build_tracker_b("tracker_b.snapshot", &ProviderSettings::default())
            .err()
            .expect("missing directory");
        assert!(matches!(
            error,
            TrackerProviderError::ProviderInitialization(_)
        ));
    }

    #[tokio::test]
    async fn mapping_store_follows_the_issue_tracker_provider() {
        let store = build_mapping_store("tracker_b.memory", &ProviderSettings::default())
            .expect("memory store");
        assert!(store
            .lookup(&tracksync_domain::TenantId::new("acme"))
            .await
            .expect("lookup")
            .is_empty());

        assert!(build_mapping_store("tracker_a.snapshot", &settings()).is_err());
    }
}
