use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tracksync_config::TracksyncConfig;
use tracksync_domain::{CoreError, TenantId};
use tracksync_scheduler::{
    run_tenants, CycleOutcome, CycleSettings, ReconcileCycle, ReconcileScheduler,
};
use tracksync_ticketing::{
    build_mapping_store, build_tracker_a, build_tracker_b, resolve_provider_kind, IgnoreList,
    MemoryIgnoreList, ProviderSettings, SnapshotIgnoreList, TrackerProviderError,
    TrackerProviderKind,
};

/// Fully wired reconciliation service for one configuration.
pub struct App {
    config: TracksyncConfig,
    tenants: Vec<TenantId>,
    cycle: Arc<ReconcileCycle>,
}

/// Serializable outcome of one run for one tenant.
#[derive(Debug, Serialize)]
pub struct TenantRunSummary {
    pub tenant: TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CycleOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TenantRunSummary {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

fn provider_error(error: TrackerProviderError) -> CoreError {
    CoreError::Configuration(error.to_string())
}

impl App {
    pub async fn from_config(config: TracksyncConfig) -> Result<Self, CoreError> {
        let providers = config.providers();
        let settings = ProviderSettings {
            snapshot_dir: providers.snapshot_dir.clone(),
        };
        let tracker_a =
            build_tracker_a(&providers.tracker_a_provider, &settings).map_err(provider_error)?;
        let tracker_b =
            build_tracker_b(&providers.tracker_b_provider, &settings).map_err(provider_error)?;
        let mappings = build_mapping_store(&providers.tracker_b_provider, &settings)
            .map_err(provider_error)?;

        let tenants = config.tenant_ids();
        let ignore = load_ignore_list(
            &providers.tracker_b_provider,
            &providers.snapshot_dir,
            &tenants,
        )
        .await?;

        let runtime = config.scheduler_runtime();
        let cycle = ReconcileCycle::new(
            tracker_a,
            tracker_b,
            mappings,
            ignore,
            CycleSettings {
                reconcile: config.reconcile_options(),
                plan: config.sync_plan_options(),
                fetch_timeout: runtime.fetch_timeout,
                apply_changes: runtime.apply_changes,
            },
        );
        info!(
            tracker_a = %providers.tracker_a_provider,
            tracker_b = %providers.tracker_b_provider,
            tenants = tenants.len(),
            apply = runtime.apply_changes,
            "tracksync initialized"
        );

        Ok(Self {
            config,
            tenants,
            cycle: Arc::new(cycle),
        })
    }

    pub fn config(&self) -> &TracksyncConfig {
        &self.config
    }

    pub fn tenants(&self) -> &[TenantId] {
        &self.tenants
    }

    /// One reconcile pass over every configured tenant.
    pub async fn run_once(&self) -> Vec<TenantRunSummary> {
        run_tenants(&self.cycle, &self.tenants)
            .await
            .into_iter()
            .map(|(tenant, outcome)| match outcome {
                Ok(outcome) => TenantRunSummary {
                    tenant,
                    outcome: Some(outcome),
                    error: None,
                },
                Err(error) => TenantRunSummary {
                    tenant,
                    outcome: None,
                    error: Some(error.to_string()),
                },
            })
            .collect()
    }

    /// Polls every tenant on the configured interval until `shutdown`
    /// resolves.
    pub async fn watch<F>(&self, shutdown: F) -> Result<(), CoreError>
    where
        F: Future<Output = ()>,
    {
        let interval = self.config.scheduler_runtime().interval;
        let scheduler = ReconcileScheduler::new(Arc::clone(&self.cycle), interval);
        for tenant in &self.tenants {
            scheduler.register(tenant.clone()).await;
        }
        shutdown.await;
        info!("shutdown requested; stopping reconcile timers");
        scheduler.stop_all().await
    }
}

async fn load_ignore_list(
    tracker_b_provider: &str,
    snapshot_dir: &Path,
    tenants: &[TenantId],
) -> Result<Arc<dyn IgnoreList>, CoreError> {
    let kind = resolve_provider_kind(tracker_b_provider).map_err(provider_error)?;
    if kind == TrackerProviderKind::IssueSnapshot {
        let list = SnapshotIgnoreList::load(snapshot_dir, tenants).await?;
        return Ok(Arc::new(list));
    }
    Ok(Arc::new(MemoryIgnoreList::new()))
}
