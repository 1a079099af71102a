//! Per-tenant reconciliation cycles and the interval scheduler that drives
//! them.

pub mod cycle;
pub mod scheduler;

pub use cycle::{
    run_tenants, ApplyFailure, ApplyReport, CycleError, CycleOutcome, CycleReport, CycleSettings,
    ReconcileCycle, TenantIgnoreFilter,
};
pub use scheduler::{ReconcileScheduler, SchedulerEvent};
