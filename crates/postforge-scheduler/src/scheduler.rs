//! Scheduler: job lifecycle over the store and the cron registry.
//!
//! Each mutating operation holds the job id's registry slot across the
//! persisted change and the matching timer change, so concurrent calls for
//! one id apply in arrival order and leave at most one armed timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::gate::TriggerRequest;
use crate::job::{JobDefinition, JobId, ScheduledJob};
use crate::registry::CronRegistry;
use crate::runner::{ExecutionRunner, RunReport};
use crate::store::JobStore;
use crate::timer::{self, TimerCallback};

/// Result of [`Scheduler::initialize_from_store`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootReport {
    /// Jobs whose timers were armed.
    pub armed: Vec<JobId>,
    /// Active rows that were not armed, with the reason.
    pub skipped: Vec<(JobId, String)>,
    /// The call was a no-op because boot already ran.
    pub already_initialized: bool,
}

/// Job lifecycle orchestrator.
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    registry: Arc<CronRegistry>,
    runner: Arc<ExecutionRunner>,
    initialized: AtomicBool,
}

impl Scheduler {
    /// Build over the runner's store and registry.
    pub fn new(runner: Arc<ExecutionRunner>) -> Self {
        Self {
            store: runner.store().clone(),
            registry: runner.registry().clone(),
            runner,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<CronRegistry> {
        &self.registry
    }

    pub fn runner(&self) -> &Arc<ExecutionRunner> {
        &self.runner
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Validate, persist, and arm if active.
    pub async fn create_job(&self, definition: JobDefinition) -> SchedulerResult<ScheduledJob> {
        definition.validate()?;
        let mut job = self.store.insert(&definition).await?;

        if job.is_active {
            let mut slot = self.registry.slot(job.id).await;

            // Re-read under the slot; a stop or update may have landed since the insert.
            match self.store.get(job.id).await? {
                Some(current) if current.is_active && !slot.is_armed() => {
                    let compiled = current.schedule.compile()?;
                    slot.arm(compiled, self.job_callback(current.id))?;
                    job = current;
                }
                Some(current) => {
                    debug!(job_id = job.id, active = current.is_active, "Row changed before arming");
                    job = current;
                }
                None => {
                    debug!(job_id = job.id, "Row deleted before arming");
                    job.is_active = false;
                }
            }
        }

        info!(job_id = job.id, name = %job.name, active = job.is_active, "Job created");
        Ok(job)
    }

    /// Replace a job's definition and bring its timer in line.
    pub async fn update_job(
        &self,
        id: JobId,
        definition: JobDefinition,
    ) -> SchedulerResult<ScheduledJob> {
        let compiled = definition.validate()?;
        let mut slot = self.registry.slot(id).await;

        let mut job = self
            .store
            .get(id)
            .await?
            .ok_or(SchedulerError::NotFound(id))?;
        job.apply_definition(&definition, Utc::now());
        self.store.update(&job).await?;

        if job.is_active {
            slot.replace(compiled, self.job_callback(id));
        } else {
            slot.disarm();
        }

        info!(job_id = id, active = job.is_active, schedule = %job.schedule, "Job updated");
        Ok(job)
    }

    /// Disarm, cancel any in-flight run, then delete the row.
    pub async fn delete_job(&self, id: JobId) -> SchedulerResult<()> {
        let mut slot = self.registry.slot(id).await;
        let disarmed = slot.disarm();
        let cancelled = self.runner.cancel_job(id);

        let existed = self.store.delete(id).await?;
        if !existed && !disarmed {
            return Err(SchedulerError::NotFound(id));
        }

        info!(job_id = id, disarmed, cancelled, "Job deleted");
        Ok(())
    }

    /// Run a job now, outside its schedule.
    pub async fn trigger_now(&self, request: TriggerRequest) -> SchedulerResult<RunReport> {
        self.runner.execute(request).await
    }

    pub async fn get_job(&self, id: JobId) -> SchedulerResult<ScheduledJob> {
        self.store
            .get(id)
            .await?
            .ok_or(SchedulerError::NotFound(id))
    }

    pub async fn list_jobs(&self) -> SchedulerResult<Vec<ScheduledJob>> {
        Ok(self.store.list().await?)
    }

    /// Arm every active row once. Later calls are no-ops.
    pub async fn initialize_from_store(&self) -> SchedulerResult<BootReport> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Scheduler already initialized");
            return Ok(BootReport {
                already_initialized: true,
                ..Default::default()
            });
        }

        let jobs = match self.store.list_active().await {
            Ok(jobs) => jobs,
            Err(e) => {
                self.initialized.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let mut report = BootReport::default();
        for listed in jobs {
            let id = listed.id;
            let mut slot = self.registry.slot(id).await;

            // Re-read under the slot; the row may have changed since listing.
            let job = match self.store.get(id).await {
                Ok(Some(job)) if job.is_active => job,
                Ok(_) => {
                    report.skipped.push((id, "no longer active".to_string()));
                    continue;
                }
                Err(e) => {
                    warn!(job_id = id, error = %e, "Failed to load job during boot");
                    report.skipped.push((id, e.to_string()));
                    continue;
                }
            };

            let compiled = match job.schedule.compile() {
                Ok(compiled) => compiled,
                Err(e) => {
                    warn!(job_id = id, error = %e, "Stored schedule no longer compiles, skipping");
                    report.skipped.push((id, e.to_string()));
                    continue;
                }
            };

            if slot.is_armed() {
                report.skipped.push((id, "timer already armed".to_string()));
                continue;
            }
            slot.arm(compiled, self.job_callback(id))?;
            report.armed.push(id);
        }

        info!(
            armed = report.armed.len(),
            skipped = report.skipped.len(),
            "Scheduler initialized from store"
        );
        Ok(report)
    }

    /// Stop timers and in-flight runs for process exit.
    ///
    /// Persisted `is_active` flags are untouched, so the next boot re-arms the
    /// same jobs. Returns whether in-flight runs drained within `drain_timeout`.
    pub async fn shutdown(&self, drain_timeout: Duration) -> bool {
        let stopped = self.registry.stop_all().await;
        let cancelled = self.runner.cancel_all();
        let drained = self.runner.wait_idle(drain_timeout).await;

        info!(
            timers = stopped.len(),
            cancelled,
            drained,
            "Scheduler shut down"
        );
        drained
    }

    fn job_callback(&self, id: JobId) -> TimerCallback {
        let runner = Arc::downgrade(&self.runner);
        timer::callback(move || {
            let runner = runner.clone();
            async move {
                let Some(runner) = runner.upgrade() else {
                    return;
                };
                match runner.execute(TriggerRequest::internal(id)).await {
                    Ok(report) => debug!(job_id = id, run_id = %report.run_id, "Scheduled run finished"),
                    Err(e) => warn!(job_id = id, error = %e, "Scheduled run not started"),
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
