//! Providers backed by JSON files, one directory per tenant:
//!
//! ```text
//! <root>/<tenant>/tracker_a.json   array of board records
//! <root>/<tenant>/tracker_b.json   array of issues
//! <root>/<tenant>/mappings.json    array of explicit mappings (optional)
//! <root>/<tenant>/ignored.json     array of ignored identifiers (optional)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use tracksync_domain::{CoreError, ExplicitMapping, ExternalRecordA, ExternalRecordB, TenantId};

use crate::interface::{
    CreateIssueRequest, IgnoreList, MappingStore, TrackerASource, TrackerBSource,
    TrackerProviderKind, UpdateIssueStateRequest,
};

pub const BOARD_FILE: &str = "tracker_a.json";
pub const ISSUES_FILE: &str = "tracker_b.json";
pub const MAPPINGS_FILE: &str = "mappings.json";
pub const IGNORED_FILE: &str = "ignored.json";

/// Tenant ids become directory names, so anything that could escape the
/// snapshot root is rejected.
pub fn tenant_dir(root: &Path, tenant: &TenantId) -> Result<PathBuf, CoreError> {
    let name = tenant.as_str().trim();
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0');
    if !valid {
        return Err(CoreError::Configuration(format!(
            "tenant id '{}' cannot be used as a snapshot directory",
            tenant.as_str()
        )));
    }
    Ok(root.join(name))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|error| {
        CoreError::DependencyUnavailable(format!("failed to read {}: {error}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        CoreError::DependencyUnavailable(format!("failed to parse {}: {error}", path.display()))
    })
}

async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, CoreError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => read_json(path).await,
        Ok(false) => Ok(T::default()),
        Err(error) => Err(CoreError::DependencyUnavailable(format!(
            "failed to inspect {}: {error}",
            path.display()
        ))),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CoreError> {
    let encoded = serde_json::to_string_pretty(value).map_err(|error| {
        CoreError::Persistence(format!("failed to encode {}: {error}", path.display()))
    })?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|error| {
            CoreError::Persistence(format!("failed to create {}: {error}", parent.display()))
        })?;
    }
    tokio::fs::write(path, encoded).await.map_err(|error| {
        CoreError::Persistence(format!("failed to write {}: {error}", path.display()))
    })
}

#[derive(Debug, Clone)]
pub struct SnapshotTrackerA {
    root: PathBuf,
}

impl SnapshotTrackerA {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl TrackerASource for SnapshotTrackerA {
    fn kind(&self) -> TrackerProviderKind {
        TrackerProviderKind::BoardSnapshot
    }

    async fn fetch_all(&self, tenant: &TenantId) -> Result<Vec<ExternalRecordA>, CoreError> {
        let path = tenant_dir(&self.root, tenant)?.join(BOARD_FILE);
        let records: Vec<ExternalRecordA> = read_json(&path).await?;
        debug!(tenant = %tenant, count = records.len(), "loaded board snapshot");
        Ok(records)
    }
}

/// Issue snapshot that also accepts writes, so apply mode can run against
/// files. Writes for one provider instance are serialized.
#[derive(Debug, Clone)]
pub struct SnapshotTrackerB {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotTrackerB {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn issues_path(&self, tenant: &TenantId) -> Result<PathBuf, CoreError> {
        Ok(tenant_dir(&self.root, tenant)?.join(ISSUES_FILE))
    }
}

fn next_snapshot_id(issues: &[ExternalRecordB]) -> String {
    let mut sequence = issues.len() + 1;
    loop {
        let candidate = format!("snap-{sequence}");
        if !issues.iter().any(|issue| issue.answers_to(&candidate)) {
            return candidate;
        }
        sequence += 1;
    }
}

#[async_trait]
impl TrackerBSource for SnapshotTrackerB {
    fn kind(&self) -> TrackerProviderKind {
        TrackerProviderKind::IssueSnapshot
    }

    async fn fetch_all(&self, tenant: &TenantId) -> Result<Vec<ExternalRecordB>, CoreError> {
        let issues: Vec<ExternalRecordB> = read_json(&self.issues_path(tenant)?).await?;
        debug!(tenant = %tenant, count = issues.len(), "loaded issue snapshot");
        Ok(issues)
    }

    async fn create_issue(
        &self,
        tenant: &TenantId,
        request: CreateIssueRequest,
    ) -> Result<ExternalRecordB, CoreError> {
        request.validate()?;
        let path = self.issues_path(tenant)?;
        let _guard = self.write_lock.lock().await;

        let mut issues: Vec<ExternalRecordB> = read_json_or_default(&path).await?;
        let issue = ExternalRecordB {
            id: next_snapshot_id(&issues),
            key: None,
            summary: request.summary.trim().to_owned(),
            description: request.description,
            state: request.state.trim().to_owned(),
            subsystem: request.subsystem,
            created_at: String::new(),
            updated_at: String::new(),
        };
        issues.push(issue.clone());
        write_json(&path, &issues).await?;
        Ok(issue)
    }

    async fn update_issue_state(
        &self,
        tenant: &TenantId,
        request: UpdateIssueStateRequest,
    ) -> Result<(), CoreError> {
        request.validate()?;
        let path = self.issues_path(tenant)?;
        let _guard = self.write_lock.lock().await;

        let mut issues: Vec<ExternalRecordB> = read_json(&path).await?;
        let issue = issues
            .iter_mut()
            .find(|issue| issue.answers_to(&request.issue_id))
            .ok_or_else(|| {
                CoreError::Configuration(format!("unknown issue {}", request.issue_id.trim()))
            })?;
        issue.state = request.state.trim().to_owned();
        write_json(&path, &issues).await
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotMappingStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotMappingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl MappingStore for SnapshotMappingStore {
    async fn lookup(&self, tenant: &TenantId) -> Result<Vec<ExplicitMapping>, CoreError> {
        let path = tenant_dir(&self.root, tenant)?.join(MAPPINGS_FILE);
        read_json_or_default(&path).await
    }

    async fn record(&self, tenant: &TenantId, mapping: ExplicitMapping) -> Result<(), CoreError> {
        let path = tenant_dir(&self.root, tenant)?.join(MAPPINGS_FILE);
        let _guard = self.write_lock.lock().await;

        let mut mappings: Vec<ExplicitMapping> = read_json_or_default(&path)
            .await
            .map_err(|error| CoreError::Persistence(error.to_string()))?;
        if mappings.contains(&mapping) {
            return Ok(());
        }
        mappings.push(mapping);
        mappings.sort();
        write_json(&path, &mappings).await
    }
}

/// Ignore sets read once from every tenant directory under the root.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIgnoreList {
    ignored: BTreeMap<TenantId, BTreeSet<String>>,
}

impl SnapshotIgnoreList {
    pub async fn load(root: &Path, tenants: &[TenantId]) -> Result<Self, CoreError> {
        let mut ignored = BTreeMap::new();
        for tenant in tenants {
            let path = tenant_dir(root, tenant)?.join(IGNORED_FILE);
            let identifiers: Vec<String> = read_json_or_default(&path).await?;
            let identifiers = identifiers
                .into_iter()
                .map(|identifier| identifier.trim().to_owned())
                .filter(|identifier| !identifier.is_empty())
                .collect::<BTreeSet<_>>();
            ignored.insert(tenant.clone(), identifiers);
        }
        Ok(Self { ignored })
    }
}

impl IgnoreList for SnapshotIgnoreList {
    fn is_ignored(&self, tenant: &TenantId, identifier: &str) -> bool {
        self.ignored
            .get(tenant)
            .is_some_and(|ignored| ignored.contains(identifier.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::{tenant_dir, SnapshotIgnoreList, SnapshotTrackerA, IGNORED_FILE};
    use crate::interface::{IgnoreList, TrackerASource};
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};
    use tracksync_domain::{CoreError, TenantId};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "tracksync-snapshot-{prefix}-{}-{nanos}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("create temp dir");
        path
    }

    fn remove_temp_path(path: &Path) {
        let _ = std::fs::remove_dir_all(path);
    }

    #[test]
    fn tenant_dir_rejects_path_escapes() {
        let root = Path::new("/snapshots");
        assert_eq!(
            tenant_dir(root, &TenantId::new("acme")).expect("valid tenant"),
            root.join("acme")
        );
        for invalid in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                tenant_dir(root, &TenantId::new(invalid)),
                Err(CoreError::Configuration(_))
            ));
        }
    }

    #[tokio::test]
    async fn missing_board_snapshot_is_a_dependency_failure() {
        let root = unique_temp_dir("missing-board");
        let board = SnapshotTrackerA::new(&root);

        let error = board
            .fetch_all(&TenantId::new("acme"))
            .await
            .expect_err("missing file");

        assert!(matches!(error, CoreError::DependencyUnavailable(_)));
        remove_temp_path(&root);
    }

    #[tokio::test]
    async fn ignore_list_loads_optional_files() {
        let root = unique_temp_dir("ignored");
        std::fs::create_dir_all(root.join("acme")).expect("tenant dir");
        std::fs::write(root.join("acme").join(IGNORED_FILE), r#"[" 1201 ", ""]"#)
            .expect("write ignored");

        let tenants = [TenantId::new("acme"), TenantId::new("globex")];
        let list = SnapshotIgnoreList::load(&root, &tenants)
            .await
            .expect("load ignore list");

        assert!(list.is_ignored(&tenants[0], "1201"));
        assert!(!list.is_ignored(&tenants[1], "1201"));
        remove_temp_path(&root);
    }
}
