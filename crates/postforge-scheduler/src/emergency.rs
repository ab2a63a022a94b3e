//! Emergency stop.
//!
//! `stop_all` halts generation in a fixed order: suspend external triggers,
//! stop every timer, cancel in-flight runs, persist `is_active = false` for
//! every active job, then wait a bounded time for runs to drain. A failure on
//! one job is collected and the sweep continues.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::gate::TriggerGate;
use crate::job::JobId;
use crate::registry::CronRegistry;
use crate::runner::ExecutionRunner;
use crate::store::JobStore;

/// Result of an emergency stop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StopReport {
    /// Distinct jobs whose timer was stopped or that were disabled.
    pub jobs_stopped: usize,
    pub timers_stopped: usize,
    pub runs_cancelled: usize,
    pub errors: Vec<String>,
    /// In-flight runs finished within the drain timeout.
    pub drained: bool,
}

/// Snapshot used to confirm a halt.
#[derive(Debug, Clone, Serialize)]
pub struct LockdownStatus {
    pub active_timer_count: usize,
    pub active_job_ids: Vec<JobId>,
    pub in_flight_run_count: usize,
    pub triggers_suspended: bool,
    /// No timers, no runs, and external triggers suspended.
    pub lockdown: bool,
}

pub struct EmergencyController {
    store: Arc<dyn JobStore>,
    registry: Arc<CronRegistry>,
    runner: Arc<ExecutionRunner>,
    gate: Arc<TriggerGate>,
    drain_timeout: Duration,
}

impl EmergencyController {
    pub fn new(runner: Arc<ExecutionRunner>, drain_timeout: Duration) -> Self {
        Self {
            store: runner.store().clone(),
            registry: runner.registry().clone(),
            gate: runner.gate().clone(),
            runner,
            drain_timeout,
        }
    }

    /// Halt all generation and disable every active job.
    pub async fn stop_all(&self) -> StopReport {
        warn!("Emergency stop requested");
        let mut report = StopReport::default();

        self.gate.suspend();

        let stopped = self.registry.stop_all().await;
        report.timers_stopped = stopped.len();
        let mut affected: BTreeSet<JobId> = stopped.into_iter().collect();

        report.runs_cancelled = self.runner.cancel_all();

        match self.store.list_active().await {
            Ok(jobs) => {
                for job in jobs {
                    match self.deactivate(job.id).await {
                        Ok(true) => {
                            affected.insert(job.id);
                        }
                        Ok(false) => {}
                        Err(message) => {
                            error!(job_id = job.id, error = %message, "Emergency stop failed for job");
                            report.errors.push(message);
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Emergency stop could not list active jobs");
                report.errors.push(format!("failed to list active jobs: {}", e));
            }
        }

        report.jobs_stopped = affected.len();
        report.drained = self.runner.wait_idle(self.drain_timeout).await;
        if !report.drained {
            warn!(
                remaining = self.runner.in_flight_count(),
                "In-flight runs did not drain before timeout"
            );
        }

        info!(
            jobs_stopped = report.jobs_stopped,
            timers_stopped = report.timers_stopped,
            runs_cancelled = report.runs_cancelled,
            errors = report.errors.len(),
            "Emergency stop complete"
        );
        report
    }

    /// Persist `is_active = false` for one job under its slot.
    async fn deactivate(&self, id: JobId) -> Result<bool, String> {
        let mut slot = self.registry.slot(id).await;
        let disarmed = slot.disarm();

        let mut job = match self.store.get(id).await {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(disarmed),
            Err(e) => return Err(format!("job {}: {}", id, e)),
        };
        if !job.is_active {
            return Ok(disarmed);
        }

        job.is_active = false;
        job.updated_at = Utc::now();
        self.store
            .update(&job)
            .await
            .map_err(|e| format!("job {}: {}", id, e))?;
        Ok(true)
    }

    /// Lift trigger suspension. Jobs stay disabled until re-enabled.
    pub fn resume(&self) {
        self.gate.resume();
        info!("Emergency stop lifted");
    }

    pub fn status(&self) -> LockdownStatus {
        let active_job_ids: Vec<JobId> = self.registry.list_active().into_keys().collect();
        let active_timer_count = active_job_ids.len();
        let in_flight_run_count = self.runner.in_flight_count();
        let triggers_suspended = self.gate.is_suspended();

        LockdownStatus {
            active_timer_count,
            active_job_ids,
            in_flight_run_count,
            triggers_suspended,
            lockdown: active_timer_count == 0 && in_flight_run_count == 0 && triggers_suspended,
        }
    }
}

#[cfg(test)]
#[path = "emergency_tests.rs"]
mod tests;
