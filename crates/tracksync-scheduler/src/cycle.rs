use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracksync_domain::{
    CoreError, ExplicitMapping, ExternalRecordA, ExternalRecordB, IgnoreFilter, TenantId,
    TicketAnalysisResult,
};
use tracksync_engine::{
    plan_sync_actions, reconcile, CreateIssuePlan, ReconcileInput, ReconcileOptions, SyncAction,
    SyncPlan, SyncPlanOptions, UpdateIssueStatePlan,
};
use tracksync_ticketing::{
    CreateIssueRequest, IgnoreList, MappingStore, TrackerASource, TrackerBSource,
    UpdateIssueStateRequest,
};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    pub reconcile: ReconcileOptions,
    pub plan: SyncPlanOptions,
    /// Upper bound for the concurrent fetch of both trackers.
    pub fetch_timeout: Duration,
    /// Execute the planned actions instead of only reporting them.
    pub apply_changes: bool,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            reconcile: ReconcileOptions::default(),
            plan: SyncPlanOptions::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            apply_changes: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch for tenant {tenant} failed: {source}")]
    Fetch { tenant: TenantId, source: CoreError },
    #[error("fetch for tenant {tenant} timed out after {timeout:?}")]
    FetchTimeout { tenant: TenantId, timeout: Duration },
    #[error("mapping lookup for tenant {tenant} failed: {source}")]
    Mappings { tenant: TenantId, source: CoreError },
    #[error("reconcile task for tenant {tenant} did not finish: {reason}")]
    Aborted { tenant: TenantId, reason: String },
}

impl CycleError {
    pub fn tenant(&self) -> &TenantId {
        match self {
            Self::Fetch { tenant, .. }
            | Self::FetchTimeout { tenant, .. }
            | Self::Mappings { tenant, .. }
            | Self::Aborted { tenant, .. } => tenant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyFailure {
    pub a_id: String,
    /// `create_issue`, `record_mapping` or `update_issue_state`.
    pub step: &'static str,
    pub error: String,
}

/// What apply mode actually changed. Individual failures do not stop the
/// remaining actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub created: Vec<ExplicitMapping>,
    pub updated: Vec<String>,
    pub failures: Vec<ApplyFailure>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, a_id: &str, step: &'static str, error: CoreError) {
        warn!(a_id = %a_id, step, error = %error, "sync action failed");
        self.failures.push(ApplyFailure {
            a_id: a_id.to_owned(),
            step,
            error: error.to_string(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub tenant: TenantId,
    pub result: TicketAnalysisResult,
    pub plan: SyncPlan,
    /// `None` for dry runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply: Option<ApplyReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(Box<CycleReport>),
    SkippedInFlight,
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::SkippedInFlight => None,
        }
    }
}

/// Adapts the tenant-scoped ignore list to the engine's filter.
pub struct TenantIgnoreFilter<'a> {
    list: &'a dyn IgnoreList,
    tenant: &'a TenantId,
}

impl<'a> TenantIgnoreFilter<'a> {
    pub fn new(list: &'a dyn IgnoreList, tenant: &'a TenantId) -> Self {
        Self { list, tenant }
    }
}

impl IgnoreFilter for TenantIgnoreFilter<'_> {
    fn is_ignored(&self, identifier: &str) -> bool {
        self.list.is_ignored(self.tenant, identifier)
    }
}

#[derive(Debug, Default)]
struct InFlight {
    tenants: Mutex<BTreeSet<TenantId>>,
}

impl InFlight {
    fn try_acquire(&self, tenant: &TenantId) -> Option<InFlightGuard<'_>> {
        let mut tenants = self.tenants.lock().unwrap_or_else(PoisonError::into_inner);
        if !tenants.insert(tenant.clone()) {
            return None;
        }
        Some(InFlightGuard {
            owner: self,
            tenant: tenant.clone(),
        })
    }
}

struct InFlightGuard<'a> {
    owner: &'a InFlight,
    tenant: TenantId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.tenant);
    }
}

/// One fetch, reconcile and optional apply pass. Runs for different tenants
/// may overlap; a second run for a tenant that is still in flight is
/// skipped.
pub struct ReconcileCycle {
    tracker_a: Arc<dyn TrackerASource>,
    tracker_b: Arc<dyn TrackerBSource>,
    mappings: Arc<dyn MappingStore>,
    ignore: Arc<dyn IgnoreList>,
    settings: CycleSettings,
    in_flight: InFlight,
}

impl ReconcileCycle {
    pub fn new(
        tracker_a: Arc<dyn TrackerASource>,
        tracker_b: Arc<dyn TrackerBSource>,
        mappings: Arc<dyn MappingStore>,
        ignore: Arc<dyn IgnoreList>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            tracker_a,
            tracker_b,
            mappings,
            ignore,
            settings,
            in_flight: InFlight::default(),
        }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub async fn run(&self, tenant: &TenantId) -> Result<CycleOutcome, CycleError> {
        let Some(_guard) = self.in_flight.try_acquire(tenant) else {
            debug!(tenant = %tenant, "reconcile already in flight; skipping");
            return Ok(CycleOutcome::SkippedInFlight);
        };

        let (a_records, b_records) = self.fetch(tenant).await?;
        let mappings =
            self.mappings
                .lookup(tenant)
                .await
                .map_err(|source| CycleError::Mappings {
                    tenant: tenant.clone(),
                    source,
                })?;
        debug!(
            tenant = %tenant,
            board_records = a_records.len(),
            issues = b_records.len(),
            mappings = mappings.len(),
            "fetched reconcile snapshot"
        );

        let input = ReconcileInput {
            a_records,
            b_records,
            mappings,
        };
        let ignore = TenantIgnoreFilter::new(self.ignore.as_ref(), tenant);
        let result = reconcile(&input, &self.settings.reconcile, &ignore);
        let plan = plan_sync_actions(&result, &self.settings.plan);

        let apply = if self.settings.apply_changes {
            Some(self.apply(tenant, &plan).await)
        } else {
            None
        };

        let counts = result.counts();
        info!(
            tenant = %tenant,
            matched = counts.matched,
            mismatched = counts.mismatched,
            missing_in_b = counts.missing_in_b,
            orphaned_in_b = counts.orphaned_in_b,
            planned_actions = plan.actions.len(),
            applied = apply.is_some(),
            "reconcile cycle finished"
        );

        Ok(CycleOutcome::Completed(Box::new(CycleReport {
            tenant: tenant.clone(),
            result,
            plan,
            apply,
        })))
    }

    async fn fetch(
        &self,
        tenant: &TenantId,
    ) -> Result<(Vec<ExternalRecordA>, Vec<ExternalRecordB>), CycleError> {
        let timeout = self.settings.fetch_timeout;
        let fetched = tokio::time::timeout(timeout, async {
            tokio::try_join!(
                self.tracker_a.fetch_all(tenant),
                self.tracker_b.fetch_all(tenant)
            )
        })
        .await;

        match fetched {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(source)) => {
                warn!(tenant = %tenant, error = %source, "reconcile fetch failed; run aborted");
                Err(CycleError::Fetch {
                    tenant: tenant.clone(),
                    source,
                })
            }
            Err(_) => {
                warn!(
                    tenant = %tenant,
                    timeout_ms = timeout.as_millis() as u64,
                    "reconcile fetch timed out; run aborted"
                );
                Err(CycleError::FetchTimeout {
                    tenant: tenant.clone(),
                    timeout,
                })
            }
        }
    }

    async fn apply(&self, tenant: &TenantId, plan: &SyncPlan) -> ApplyReport {
        let mut report = ApplyReport::default();
        for action in &plan.actions {
            match action {
                SyncAction::CreateIssue(create) => {
                    self.apply_create(tenant, create, &mut report).await
                }
                SyncAction::UpdateIssueState(update) => {
                    self.apply_update(tenant, update, &mut report).await
                }
            }
        }
        report
    }

    async fn apply_create(
        &self,
        tenant: &TenantId,
        create: &CreateIssuePlan,
        report: &mut ApplyReport,
    ) {
        let request = CreateIssueRequest {
            summary: create.summary.clone(),
            description: create.description.clone(),
            state: create.state.clone(),
            subsystem: create.subsystem.clone(),
        };
        let issue = match self.tracker_b.create_issue(tenant, request).await {
            Ok(issue) => issue,
            Err(error) => return report.fail(&create.a_id, "create_issue", error),
        };

        let mapping = ExplicitMapping::new(create.a_id.clone(), issue.id.clone());
        match self.mappings.record(tenant, mapping.clone()).await {
            Ok(()) => {
                debug!(tenant = %tenant, a_id = %create.a_id, b_id = %issue.id, "created issue");
                report.created.push(mapping);
            }
            // The back-reference in the description still pairs it next run.
            Err(error) => report.fail(&create.a_id, "record_mapping", error),
        }
    }

    async fn apply_update(
        &self,
        tenant: &TenantId,
        update: &UpdateIssueStatePlan,
        report: &mut ApplyReport,
    ) {
        let request = UpdateIssueStateRequest {
            issue_id: update.b_id.clone(),
            state: update.to.clone(),
        };
        match self.tracker_b.update_issue_state(tenant, request).await {
            Ok(()) => {
                debug!(
                    tenant = %tenant,
                    a_id = %update.a_id,
                    b_id = %update.b_id,
                    from = %update.from,
                    to = %update.to,
                    "updated issue state"
                );
                report.updated.push(update.a_id.clone());
            }
            Err(error) => report.fail(&update.a_id, "update_issue_state", error),
        }
    }
}

/// Runs every tenant concurrently and returns the outcomes in tenant order.
pub async fn run_tenants(
    cycle: &Arc<ReconcileCycle>,
    tenants: &[TenantId],
) -> Vec<(TenantId, Result<CycleOutcome, CycleError>)> {
    let handles = tenants
        .iter()
        .map(|tenant| {
            let cycle = Arc::clone(cycle);
            let owned = tenant.clone();
            (
                tenant.clone(),
                tokio::spawn(async move { cycle.run(&owned).await }),
            )
        })
        .collect::<Vec<_>>();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (tenant, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(error) => Err(CycleError::Aborted {
                tenant: tenant.clone(),
                reason: error.to_string(),
            }),
        };
        outcomes.push((tenant, outcome));
    }
    outcomes
}
