//! In-process providers. Used for tests and for wiring the scheduler without
//! any tracker behind it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracksync_domain::{CoreError, ExplicitMapping, ExternalRecordA, ExternalRecordB, TenantId};

use crate::interface::{
    CreateIssueRequest, IgnoreList, MappingStore, TrackerASource, TrackerBSource,
    TrackerProviderKind, UpdateIssueStateRequest,
};

fn poisoned(what: &str) -> CoreError {
    CoreError::DependencyUnavailable(format!("{what} lock poisoned"))
}

/// Fault injection shared by the in-memory trackers.
#[derive(Debug, Default)]
struct FetchBehavior {
    failure: Option<String>,
    delay: Option<Duration>,
}

impl FetchBehavior {
    async fn apply(behavior: &RwLock<FetchBehavior>) -> Result<(), CoreError> {
        let (failure, delay) = {
            let guard = behavior.read().map_err(|_| poisoned("fetch behavior"))?;
            (guard.failure.clone(), guard.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(message) => Err(CoreError::DependencyUnavailable(message)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTrackerA {
    records: Arc<RwLock<BTreeMap<TenantId, Vec<ExternalRecordA>>>>,
    behavior: Arc<RwLock<FetchBehavior>>,
}

impl MemoryTrackerA {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, tenant: &TenantId, records: Vec<ExternalRecordA>) -> Self {
        self.replace(tenant, records);
        self
    }

    pub fn replace(&self, tenant: &TenantId, records: Vec<ExternalRecordA>) {
        if let Ok(mut guard) = self.records.write() {
            guard.insert(tenant.clone(), records);
        }
    }

    /// Every later fetch fails with `message` until cleared with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        if let Ok(mut guard) = self.behavior.write() {
            guard.failure = message.map(str::to_owned);
        }
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.behavior.write() {
            guard.delay = delay;
        }
    }
}

#[async_trait]
impl TrackerASource for MemoryTrackerA {
    fn kind(&self) -> TrackerProviderKind {
        TrackerProviderKind::BoardMemory
    }

    async fn fetch_all(&self, tenant: &TenantId) -> Result<Vec<ExternalRecordA>, CoreError> {
        FetchBehavior::apply(&self.behavior).await?;
        let guard = self.records.read().map_err(|_| poisoned("board records"))?;
        Ok(guard.get(tenant).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTrackerB {
    issues: Arc<RwLock<BTreeMap<TenantId, Vec<ExternalRecordB>>>>,
    behavior: Arc<RwLock<FetchBehavior>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryTrackerB {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issues(self, tenant: &TenantId, issues: Vec<ExternalRecordB>) -> Self {
        self.replace(tenant, issues);
        self
    }

    pub fn replace(&self, tenant: &TenantId, issues: Vec<ExternalRecordB>) {
        if let Ok(mut guard) = self.issues.write() {
            guard.insert(tenant.clone(), issues);
        }
    }

    pub fn issues(&self, tenant: &TenantId) -> Vec<ExternalRecordB> {
        self.issues
            .read()
            .ok()
            .and_then(|guard| guard.get(tenant).cloned())
            .unwrap_or_default()
    }

    pub fn set_failure(&self, message: Option<&str>) {
        if let Ok(mut guard) = self.behavior.write() {
            guard.failure = message.map(str::to_owned);
        }
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.behavior.write() {
            guard.delay = delay;
        }
    }
}

#[async_trait]
impl TrackerBSource for MemoryTrackerB {
    fn kind(&self) -> TrackerProviderKind {
        TrackerProviderKind::IssueMemory
    }

    async fn fetch_all(&self, tenant: &TenantId) -> Result<Vec<ExternalRecordB>, CoreError> {
        FetchBehavior::apply(&self.behavior).await?;
        let guard = self.issues.read().map_err(|_| poisoned("issues"))?;
        Ok(guard.get(tenant).cloned().unwrap_or_default())
    }

    async fn create_issue(
        &self,
        tenant: &TenantId,
        request: CreateIssueRequest,
    ) -> Result<ExternalRecordB, CoreError> {
        request.validate()?;
        let sequence = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let issue = ExternalRecordB {
            id: format!("mem-{sequence}"),
            key: Some(format!("MEM-{sequence}")),
            summary: request.summary.trim().to_owned(),
            description: request.description,
            state: request.state.trim().to_owned(),
            subsystem: request.subsystem,
            created_at: String::new(),
            updated_at: String::new(),
        };

        let mut guard = self.issues.write().map_err(|_| poisoned("issues"))?;
        guard.entry(tenant.clone()).or_default().push(issue.clone());
        Ok(issue)
    }

    async fn update_issue_state(
        &self,
        tenant: &TenantId,
        request: UpdateIssueStateRequest,
    ) -> Result<(), CoreError> {
        request.validate()?;
        let mut guard = self.issues.write().map_err(|_| poisoned("issues"))?;
        let issue = guard
            .get_mut(tenant)
            .and_then(|issues| {
                issues
                    .iter_mut()
                    .find(|issue| issue.answers_to(&request.issue_id))
            })
            .ok_or_else(|| {
                CoreError::Configuration(format!("unknown issue {}", request.issue_id.trim()))
            })?;
        issue.state = request.state.trim().to_owned();
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMappingStore {
    mappings: Arc<RwLock<BTreeMap<TenantId, BTreeSet<ExplicitMapping>>>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mappings(self, tenant: &TenantId, mappings: Vec<ExplicitMapping>) -> Self {
        if let Ok(mut guard) = self.mappings.write() {
            guard
                .entry(tenant.clone())
                .or_default()
                .extend(mappings);
        }
        self
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn lookup(&self, tenant: &TenantId) -> Result<Vec<ExplicitMapping>, CoreError> {
        let guard = self.mappings.read().map_err(|_| poisoned("mappings"))?;
        Ok(guard
            .get(tenant)
            .map(|mappings| mappings.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn record(&self, tenant: &TenantId, mapping: ExplicitMapping) -> Result<(), CoreError> {
        let mut guard = self
            .mappings
            .write()
            .map_err(|_| CoreError::Persistence("mappings lock poisoned".to_owned()))?;
        guard.entry(tenant.clone()).or_default().insert(mapping);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryIgnoreList {
    ignored: Arc<RwLock<BTreeMap<TenantId, BTreeSet<String>>>>,
}

impl MemoryIgnoreList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(&self, tenant: &TenantId, identifier: &str) {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return;
        }
        if let Ok(mut guard) = self.ignored.write() {
            guard
                .entry(tenant.clone())
                .or_default()
                .insert(identifier.to_owned());
        }
    }
}

impl IgnoreList for MemoryIgnoreList {
    fn is_ignored(&self, tenant: &TenantId, identifier: &str) -> bool {
        self.ignored
            .read()
            .ok()
            .and_then(|guard| {
                guard
                    .get(tenant)
                    .map(|ignored| ignored.contains(identifier.trim()))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryIgnoreList, MemoryMappingStore, MemoryTrackerA, MemoryTrackerB};
    use crate::interface::{
        CreateIssueRequest, IgnoreList, MappingStore, TrackerASource, TrackerBSource,
        UpdateIssueStateRequest,
    };
    use tracksync_domain::{CoreError, ExplicitMapping, TenantId};

    #[tokio::test]
    async fn board_fetch_honors_injected_failure() {
        let tenant = TenantId::new("acme");
        let board = MemoryTrackerA::new();
        assert!(board.fetch_all(&tenant).await.expect("empty fetch").is_empty());

        board.set_failure(Some("board offline"));
        let error = board.fetch_all(&tenant).await.expect_err("injected failure");
        assert_eq!(
            error,
            CoreError::DependencyUnavailable("board offline".to_owned())
        );
    }

    #[tokio::test]
    async fn created_issues_are_fetchable_and_updatable_by_key() {
        let tenant = TenantId::new("acme");
        let issues = MemoryTrackerB::new();

        let created = issues
            .create_issue(
                &tenant,
                CreateIssueRequest {
                    summary: " Fix bug ".to_owned(),
                    description: "Asana Task ID: 1".to_owned(),
                    state: "Dev".to_owned(),
                    subsystem: Some("billing".to_owned()),
                },
            )
            .await
            .expect("create issue");
        assert_eq!(created.summary, "Fix bug");

        issues
            .update_issue_state(
                &tenant,
                UpdateIssueStateRequest {
                    issue_id: "mem-1".to_owned(),
                    state: "Stage".to_owned(),
                },
            )
            .await
            .expect("update issue");

        let fetched = issues.fetch_all(&tenant).await.expect("fetch issues");
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].state, "Stage");
        assert!(issues.fetch_all(&TenantId::new("other")).await.expect("fetch").is_empty());
    }

    #[tokio::test]
    async fn mapping_store_dedupes_per_tenant() {
        let tenant = TenantId::new("acme");
        let store = MemoryMappingStore::new();
        store
            .record(&tenant, ExplicitMapping::new("1", "b1"))
            .await
            .expect("record");
        store
            .record(&tenant, ExplicitMapping::new("1", "b1"))
            .await
            .expect("record again");

        assert_eq!(store.lookup(&tenant).await.expect("lookup").len(), 1);
        assert!(store.lookup(&TenantId::new("other")).await.expect("lookup").is_empty());
    }

    #[test]
    fn ignore_list_is_tenant_scoped() {
        let list = MemoryIgnoreList::new();
        list.ignore(&TenantId::new("acme"), " 1201 ");
        assert!(list.is_ignored(&TenantId::new("acme"), "1201"));
        assert!(!list.is_ignored(&TenantId::new("globex"), "1201"));
    }
}
