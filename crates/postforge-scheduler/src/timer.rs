//! Live cron timers.
//!
//! A [`TimerHandle`] owns one background task that sleeps until the next fire
//! time of a [`CompiledSchedule`] and then spawns the job callback. The
//! callback is never awaited inline, so a slow run cannot delay the timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::job::JobId;
use crate::schedule::CompiledSchedule;

/// Work spawned on every fire.
pub type TimerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`TimerCallback`].
pub fn callback<F, Fut>(f: F) -> TimerCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// Owned handle to a running timer task.
///
/// Not `Clone`: exactly one owner (the registry) decides when it stops.
/// Dropping the handle stops the timer.
pub struct TimerHandle {
    job_id: JobId,
    descriptor: String,
    token: CancellationToken,
    task: JoinHandle<()>,
    fire_count: Arc<AtomicU64>,
    armed_at: DateTime<Utc>,
}

impl TimerHandle {
    /// Start a timer task on the current runtime.
    pub fn spawn(job_id: JobId, schedule: CompiledSchedule, callback: TimerCallback) -> Self {
        let token = CancellationToken::new();
        let fire_count = Arc::new(AtomicU64::new(0));
        let descriptor = schedule.descriptor().to_string();

        let task = tokio::spawn(run_timer(
            job_id,
            schedule,
            callback,
            token.clone(),
            fire_count.clone(),
        ));

        debug!(job_id, schedule = %descriptor, "Timer armed");

        Self {
            job_id,
            descriptor,
            token,
            task,
            fire_count,
            armed_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Human-readable schedule, e.g. `daily 23:59 UTC`.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn armed_at(&self) -> DateTime<Utc> {
        self.armed_at
    }

    /// Number of times the callback has been spawned.
    pub fn fire_count(&self) -> u64 {
        self.fire_count.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled() || self.task.is_finished()
    }

    /// Stop the timer. Callbacks already spawned keep running.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
        self.task.abort();
        debug!(job_id = self.job_id, "Timer stopped");
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("job_id", &self.job_id)
            .field("descriptor", &self.descriptor)
            .field("fire_count", &self.fire_count())
            .finish()
    }
}

async fn run_timer(
    job_id: JobId,
    schedule: CompiledSchedule,
    callback: TimerCallback,
    token: CancellationToken,
    fire_count: Arc<AtomicU64>,
) {
    let mut cursor = Utc::now();

    loop {
        let Some(next) = schedule.next_after(cursor) else {
            debug!(job_id, "Schedule has no upcoming fire time");
            return;
        };

        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        trace!(job_id, next = %next.to_rfc3339(), "Timer sleeping");

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        if token.is_cancelled() {
            return;
        }

        fire_count.fetch_add(1, Ordering::Relaxed);
        debug!(job_id, fired_for = %next.to_rfc3339(), "Timer fired");
        tokio::spawn(callback());

        cursor = next.max(Utc::now());
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
