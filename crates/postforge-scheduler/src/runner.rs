//! Execution runner: one bounded, cancellable generation call per run.
//!
//! The runner checks the trigger, claims the job's in-flight slot, calls the
//! [`GenerationService`] in a spawned task raced against a timeout and a
//! cancellation token, and writes the result back inside the job's registry
//! slot so auto-pause and timer removal happen in one step.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{SchedulerError, SchedulerResult};
use crate::gate::{TriggerGate, TriggerRequest, TriggerSource};
use crate::generation::{GenerationRequest, GenerationService};
use crate::job::JobId;
use crate::registry::CronRegistry;
use crate::store::JobStore;

/// Failure and timeout policy for runs.
#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Consecutive failures that auto-pause a job.
    pub failure_threshold: u32,
    /// Upper bound for one generation call.
    pub run_timeout: Duration,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            run_timeout: Duration::from_secs(120),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded {
        items_generated: u32,
    },
    Failed {
        error: String,
        consecutive_failures: u32,
        auto_paused: bool,
    },
    /// Cancelled before its result was recorded; the result was dropped.
    Cancelled,
    /// The result could not be applied, e.g. the job was deleted mid-run.
    Discarded {
        reason: String,
    },
    /// Not started.
    Skipped {
        reason: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub job_id: JobId,
    pub source: TriggerSource,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}

struct InFlightRun {
    run_id: Uuid,
    source: TriggerSource,
    started_at: DateTime<Utc>,
    token: CancellationToken,
}

/// Removes the in-flight entry when the run ends, however it ends.
struct InFlightGuard<'a> {
    runner: &'a ExecutionRunner,
    job_id: JobId,
    run_id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let run_id = self.run_id;
        self.runner
            .in_flight
            .remove_if(&self.job_id, |_, run| run.run_id == run_id);
        self.runner.idle.notify_waiters();
    }
}

/// Runs generation for jobs and records the results.
pub struct ExecutionRunner {
    store: Arc<dyn JobStore>,
    registry: Arc<CronRegistry>,
    gate: Arc<TriggerGate>,
    generation: Arc<dyn GenerationService>,
    policy: RunPolicy,
    in_flight: DashMap<JobId, InFlightRun>,
    idle: Notify,
    /// Bumped by [`cancel_all`](Self::cancel_all) before it sweeps `in_flight`.
    cancel_epoch: AtomicU64,
}

impl ExecutionRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<CronRegistry>,
        gate: Arc<TriggerGate>,
        generation: Arc<dyn GenerationService>,
        policy: RunPolicy,
    ) -> Self {
        Self {
            store,
            registry,
            gate,
            generation,
            policy,
            in_flight: DashMap::new(),
            idle: Notify::new(),
            cancel_epoch: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<CronRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<TriggerGate> {
        &self.gate
    }

    pub fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    /// Run generation for `request.job_id`.
    ///
    /// Errors are returned only for requests that never start: a denied
    /// trigger, an unknown job, or a store failure while loading it. Every
    /// failure of the generation call itself is reported in the outcome.
    pub async fn execute(&self, request: TriggerRequest) -> SchedulerResult<RunReport> {
        let epoch = self.cancel_epoch.load(Ordering::SeqCst);
        let source = self.gate.check(&request)?;
        let job_id = request.job_id;
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or(SchedulerError::NotFound(job_id))?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let report = |outcome: RunOutcome| RunReport {
            run_id,
            job_id,
            source,
            started_at,
            finished_at: Utc::now(),
            outcome,
        };

        if source == TriggerSource::Scheduler && !job.is_active {
            debug!(job_id, "Timer fired for inactive job, skipping");
            return Ok(report(RunOutcome::Skipped {
                reason: "job is not active".to_string(),
            }));
        }

        let token = CancellationToken::new();
        match self.in_flight.entry(job_id) {
            Entry::Occupied(existing) => {
                let other = existing.get().run_id;
                drop(existing);
                info!(job_id, %run_id, running = %other, "Run already in flight, skipping");
                return Ok(report(RunOutcome::Skipped {
                    reason: format!("run {} already in flight", other),
                }));
            }
            Entry::Vacant(slot) => {
                slot.insert(InFlightRun {
                    run_id,
                    source,
                    started_at,
                    token: token.clone(),
                });
            }
        }
        let _guard = InFlightGuard {
            runner: self,
            job_id,
            run_id,
        };

        // A sweep that ran after admission but before the claim above did not
        // see this run. Either signal means it must not start.
        if self.cancel_epoch.load(Ordering::SeqCst) != epoch || self.gate.is_suspended() {
            info!(job_id, %run_id, %source, "Run admitted before a stop, cancelling");
            return Ok(report(RunOutcome::Cancelled));
        }

        info!(job_id, %run_id, %source, "Run started");

        let generation = self.generation.clone();
        let generation_request = GenerationRequest::for_job(&job, run_id);
        let mut task =
            tokio::spawn(async move { generation.generate(&generation_request).await });

        let joined = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            joined = tokio::time::timeout(self.policy.run_timeout, &mut task) => Some(joined),
        };

        let result = match joined {
            None => {
                task.abort();
                info!(job_id, %run_id, "Run cancelled");
                return Ok(report(RunOutcome::Cancelled));
            }
            Some(Err(_)) => {
                task.abort();
                Err(format!(
                    "generation timed out after {}s",
                    self.policy.run_timeout.as_secs_f64()
                ))
            }
            Some(Ok(Err(join_err))) if join_err.is_panic() => {
                Err("generation task panicked".to_string())
            }
            Some(Ok(Err(join_err))) => Err(format!("generation task failed: {}", join_err)),
            Some(Ok(Ok(Err(gen_err)))) => Err(gen_err.to_string()),
            Some(Ok(Ok(Ok(outcome)))) if outcome.success => Ok(outcome.items_generated),
            Some(Ok(Ok(Ok(outcome)))) if outcome.errors.is_empty() => {
                Err("generation reported failure".to_string())
            }
            Some(Ok(Ok(Ok(outcome)))) => Err(outcome.errors.join("; ")),
        };

        let outcome = self.record(job_id, run_id, &token, result).await;
        Ok(report(outcome))
    }

    /// Apply a run result inside the job's registry slot.
    async fn record(
        &self,
        job_id: JobId,
        run_id: Uuid,
        token: &CancellationToken,
        result: Result<u32, String>,
    ) -> RunOutcome {
        let mut slot = self.registry.slot(job_id).await;

        if token.is_cancelled() {
            info!(job_id, %run_id, "Run cancelled, discarding result");
            return RunOutcome::Cancelled;
        }

        let mut job = match self.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                info!(job_id, %run_id, "Job deleted during run, discarding result");
                return RunOutcome::Discarded {
                    reason: "job was deleted during the run".to_string(),
                };
            }
            Err(e) => {
                error!(job_id, %run_id, error = %e, "Failed to reload job after run");
                return RunOutcome::Discarded {
                    reason: format!("failed to reload job: {}", e),
                };
            }
        };

        let now = Utc::now();
        match result {
            Ok(items_generated) => {
                job.record_success(now);
                if let Err(e) = self.store.update(&job).await {
                    error!(job_id, %run_id, error = %e, "Failed to persist run success");
                }
                info!(job_id, %run_id, items_generated, "Run succeeded");
                RunOutcome::Succeeded { items_generated }
            }
            Err(error) => {
                let paused = job.record_failure(&error, now, self.policy.failure_threshold);
                let auto_paused = match self.store.update(&job).await {
                    Ok(()) => {
                        if paused {
                            slot.disarm();
                            warn!(
                                job_id,
                                %run_id,
                                failures = job.consecutive_failures,
                                "Job auto-paused after consecutive failures"
                            );
                        }
                        paused
                    }
                    Err(e) => {
                        error!(job_id, %run_id, error = %e, "Failed to persist run failure");
                        false
                    }
                };
                warn!(job_id, %run_id, %error, failures = job.consecutive_failures, "Run failed");
                RunOutcome::Failed {
                    error,
                    consecutive_failures: job.consecutive_failures,
                    auto_paused,
                }
            }
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Ids with a run in flight, ascending.
    pub fn in_flight_jobs(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.in_flight.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Source and start time of the run in flight for `job_id`.
    pub fn in_flight_run(&self, job_id: JobId) -> Option<(Uuid, TriggerSource, DateTime<Utc>)> {
        self.in_flight
            .get(&job_id)
            .map(|run| (run.run_id, run.source, run.started_at))
    }

    /// Cancel the run in flight for `job_id`. Returns whether one was found.
    pub fn cancel_job(&self, job_id: JobId) -> bool {
        match self.in_flight.get(&job_id) {
            Some(run) => {
                run.token.cancel();
                debug!(job_id, run_id = %run.run_id, "Run cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Cancel every run in flight. Returns how many were signalled.
    ///
    /// Runs admitted earlier but not yet claimed cancel themselves when they
    /// try to start.
    pub fn cancel_all(&self) -> usize {
        self.cancel_epoch.fetch_add(1, Ordering::SeqCst);
        let mut cancelled = 0;
        for run in self.in_flight.iter() {
            if !run.token.is_cancelled() {
                run.token.cancel();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(cancelled, "Cancelled in-flight runs");
        }
        cancelled
    }

    /// Wait until no run is in flight. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.in_flight.is_empty() {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
