use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracksync_ticketing::{
    CoreError, CreateIssueRequest, MappingStore, MemoryMappingStore, MemoryTrackerB,
    SnapshotMappingStore, SnapshotTrackerB, TrackerBSource, TrackerProviderKind,
    UpdateIssueStateRequest,
};
use tracksync_domain::{ExplicitMapping, TenantId};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    let path = std::env::temp_dir().join(format!(
        "tracksync-contract-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&path).expect("create temp dir");
    path
}

fn remove_temp_path(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

fn create_request(summary: &str) -> CreateIssueRequest {
    CreateIssueRequest {
        summary: summary.to_owned(),
        description: "Asana Task ID: 1201".to_owned(),
        state: "Dev".to_owned(),
        subsystem: Some("billing".to_owned()),
    }
}

async fn assert_shared_issue_tracker_contract<P>(provider: &P, expected_kind: TrackerProviderKind)
where
    P: TrackerBSource,
{
    let tenant = TenantId::new("acme");
    assert_eq!(provider.kind(), expected_kind);
    assert_eq!(provider.provider_key(), expected_kind.as_key());

    let blank_error = provider
        .create_issue(&tenant, create_request("   "))
        .await
        .expect_err("empty summary should be rejected");
    assert!(matches!(blank_error, CoreError::Configuration(_)));

    let created = provider
        .create_issue(&tenant, create_request("Fix bug"))
        .await
        .expect("create issue");
    assert!(!created.id.trim().is_empty());
    assert_eq!(created.state, "Dev");
    assert_eq!(created.subsystem.as_deref(), Some("billing"));

    provider
        .update_issue_state(
            &tenant,
            UpdateIssueStateRequest {
                issue_id: created.id.clone(),
                state: "Stage".to_owned(),
            },
        )
        .await
        .expect("update created issue");

    let unknown_error = provider
        .update_issue_state(
            &tenant,
            UpdateIssueStateRequest {
                issue_id: "does-not-exist".to_owned(),
                state: "Stage".to_owned(),
            },
        )
        .await
        .expect_err("unknown issue should be rejected");
    assert!(matches!(unknown_error, CoreError::Configuration(_)));

    let fetched = provider.fetch_all(&tenant).await.expect("fetch issues");
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].id, created.id);
    assert_eq!(fetched[0].state, "Stage");
    assert_eq!(fetched[0].description, "Asana Task ID: 1201");
}

async fn assert_shared_mapping_store_contract<S>(store: &S)
where
    S: MappingStore,
{
    let tenant = TenantId::new("acme");
    assert!(store.lookup(&tenant).await.expect("empty lookup").is_empty());

    store
        .record(&tenant, ExplicitMapping::new("1202", "b2"))
        .await
        .expect("record mapping");
    store
        .record(&tenant, ExplicitMapping::new("1201", "b1"))
        .await
        .expect("record mapping");
    store
        .record(&tenant, ExplicitMapping::new("1201", "b1"))
        .await
        .expect("record duplicate mapping");

    let mut mappings = store.lookup(&tenant).await.expect("lookup");
    mappings.sort();
    assert_eq!(
        mappings,
        vec![
            ExplicitMapping::new("1201", "b1"),
            ExplicitMapping::new("1202", "b2"),
        ]
    );
    assert!(store
        .lookup(&TenantId::new("globex"))
        .await
        .expect("other tenant")
        .is_empty());
}

#[tokio::test]
async fn memory_issue_tracker_satisfies_shared_contract() {
    let provider = MemoryTrackerB::new();
    assert_shared_issue_tracker_contract(&provider, TrackerProviderKind::IssueMemory).await;
}

#[tokio::test]
async fn snapshot_issue_tracker_satisfies_shared_contract() {
    let root = unique_temp_dir("issues");
    let provider = SnapshotTrackerB::new(&root);
    assert_shared_issue_tracker_contract(&provider, TrackerProviderKind::IssueSnapshot).await;
    remove_temp_path(&root);
}

#[tokio::test]
async fn memory_mapping_store_satisfies_shared_contract() {
    assert_shared_mapping_store_contract(&MemoryMappingStore::new()).await;
}

#[tokio::test]
async fn snapshot_mapping_store_satisfies_shared_contract() {
    let root = unique_temp_dir("mappings");
    assert_shared_mapping_store_contract(&SnapshotMappingStore::new(&root)).await;
    remove_temp_path(&root);
}
