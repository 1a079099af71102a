use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracksync_domain::{CoreError, TenantId};

use crate::cycle::{CycleError, CycleOutcome, ReconcileCycle};

/// Emitted after every scheduled run when a listener is attached.
#[derive(Debug)]
pub struct SchedulerEvent {
    pub tenant: TenantId,
    pub outcome: Result<CycleOutcome, CycleError>,
}

#[derive(Debug)]
struct PollerState {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// One interval timer per registered tenant, all sharing one cycle.
pub struct ReconcileScheduler {
    cycle: Arc<ReconcileCycle>,
    interval: Duration,
    events: Option<mpsc::UnboundedSender<SchedulerEvent>>,
    pollers: Mutex<BTreeMap<TenantId, PollerState>>,
}

impl ReconcileScheduler {
    pub fn new(cycle: Arc<ReconcileCycle>, interval: Duration) -> Self {
        Self {
            cycle,
            interval,
            events: None,
            pollers: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Starts polling `tenant`; the first run fires immediately. Returns
    /// false when the tenant already has a timer.
    pub async fn register(&self, tenant: TenantId) -> bool {
        let mut pollers = self.pollers.lock().await;
        if pollers.contains_key(&tenant) {
            return false;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let cycle = Arc::clone(&self.cycle);
        let events = self.events.clone();
        let period = self.interval;
        let polled = tenant.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        let outcome = cycle.run(&polled).await;
                        match &outcome {
                            Ok(CycleOutcome::Completed(_)) => {}
                            Ok(CycleOutcome::SkippedInFlight) => {
                                debug!(tenant = %polled, "scheduled reconcile skipped; previous run still in flight");
                            }
                            Err(error) => {
                                warn!(tenant = %polled, error = %error, "scheduled reconcile failed");
                            }
                        }
                        if let Some(events) = events.as_ref() {
                            let _ = events.send(SchedulerEvent {
                                tenant: polled.clone(),
                                outcome,
                            });
                        }
                    }
                }
            }
        });

        info!(tenant = %tenant, interval_secs = period.as_secs(), "registered reconcile timer");
        pollers.insert(
            tenant,
            PollerState {
                stop_tx: Some(stop_tx),
                task,
            },
        );
        true
    }

    /// Stops the tenant's timer and waits for an in-progress run to finish.
    /// Returns false when nothing was registered.
    pub async fn cancel(&self, tenant: &TenantId) -> Result<bool, CoreError> {
        let state = {
            let mut pollers = self.pollers.lock().await;
            pollers.remove(tenant)
        };

        match state {
            Some(state) => {
                stop_poller(tenant, state).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn registered(&self) -> Vec<TenantId> {
        self.pollers.lock().await.keys().cloned().collect()
    }

    pub async fn stop_all(&self) -> Result<(), CoreError> {
        let states = {
            let mut pollers = self.pollers.lock().await;
            std::mem::take(&mut *pollers)
        };

        let mut first_error = None;
        for (tenant, state) in states {
            if let Err(error) = stop_poller(&tenant, state).await {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

async fn stop_poller(tenant: &TenantId, mut state: PollerState) -> Result<(), CoreError> {
    if let Some(stop_tx) = state.stop_tx.take() {
        let _ = stop_tx.send(());
    }
    state.task.await.map_err(|error| {
        CoreError::DependencyUnavailable(format!(
            "reconcile timer for tenant {tenant} failed to join: {error}"
        ))
    })?;
    info!(tenant = %tenant, "stopped reconcile timer");
    Ok(())
}
