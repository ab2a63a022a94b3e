//! Cron registry: the only owner of live timers.
//!
//! Every mutation for a job id runs inside that id's slot, a FIFO async
//! mutex. Different ids never contend. Callers that must make a persisted
//! change and the matching timer change one step (the scheduler, the
//! runner's auto-pause) hold the slot across both.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::error::RegistryError;
use crate::job::JobId;
use crate::schedule::CompiledSchedule;
use crate::timer::{TimerCallback, TimerHandle};

#[derive(Default)]
struct Slot {
    timer: Option<TimerHandle>,
}

/// Map from job id to at most one armed timer.
pub struct CronRegistry {
    slots: DashMap<JobId, Arc<Mutex<Slot>>>,
    /// Descriptor snapshot, written only while the id's slot is held.
    armed: DashMap<JobId, String>,
}

impl CronRegistry {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            armed: DashMap::new(),
        }
    }

    /// Enter the critical section for `id`.
    ///
    /// Waiters are admitted in arrival order.
    pub async fn slot(&self, id: JobId) -> SlotGuard<'_> {
        let slot = self
            .slots
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
            .value()
            .clone();
        let guard = slot.lock_owned().await;

        SlotGuard {
            registry: self,
            id,
            guard: Some(guard),
        }
    }

    /// Arm a timer for `id`. Fails if one is already armed.
    pub async fn register(
        &self,
        id: JobId,
        schedule: CompiledSchedule,
        callback: TimerCallback,
    ) -> Result<(), RegistryError> {
        self.slot(id).await.arm(schedule, callback)
    }

    /// Disarm any existing timer for `id` and arm a new one.
    pub async fn replace(&self, id: JobId, schedule: CompiledSchedule, callback: TimerCallback) {
        self.slot(id).await.replace(schedule, callback);
    }

    /// Stop and remove the timer for `id`. Returns whether one was armed.
    pub async fn unregister(&self, id: JobId) -> bool {
        self.slot(id).await.disarm()
    }

    /// Snapshot of armed timers as `{id -> schedule descriptor}`.
    pub fn list_active(&self) -> BTreeMap<JobId, String> {
        self.armed
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.armed.len()
    }

    pub fn is_armed(&self, id: JobId) -> bool {
        self.armed.contains_key(&id)
    }

    /// Disarm every timer. Returns the ids that were stopped, ascending.
    pub async fn stop_all(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.slots.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();

        let mut stopped = Vec::new();
        for id in ids {
            if self.slot(id).await.disarm() {
                stopped.push(id);
            }
        }

        if !stopped.is_empty() {
            info!(count = stopped.len(), "Stopped all timers");
        }
        stopped
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl Default for CronRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to one job id's timer.
pub struct SlotGuard<'a> {
    registry: &'a CronRegistry,
    id: JobId,
    guard: Option<OwnedMutexGuard<Slot>>,
}

impl SlotGuard<'_> {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn is_armed(&self) -> bool {
        self.guard.as_ref().is_some_and(|slot| slot.timer.is_some())
    }

    /// Arm a timer. An existing timer is an invariant violation.
    pub fn arm(
        &mut self,
        schedule: CompiledSchedule,
        callback: TimerCallback,
    ) -> Result<(), RegistryError> {
        if self.is_armed() {
            error!(
                job_id = self.id,
                "Duplicate timer registration; job already has an armed timer"
            );
            return Err(RegistryError::DuplicateRegistration(self.id));
        }
        self.install(schedule, callback);
        Ok(())
    }

    /// Replace any armed timer with a new one. Returns whether one was replaced.
    pub fn replace(&mut self, schedule: CompiledSchedule, callback: TimerCallback) -> bool {
        let replaced = self.take_timer().is_some();
        self.install(schedule, callback);
        if replaced {
            debug!(job_id = self.id, "Timer replaced");
        }
        replaced
    }

    /// Stop the armed timer, if any. Returns whether one was stopped.
    pub fn disarm(&mut self) -> bool {
        match self.take_timer() {
            Some(timer) => {
                timer.stop();
                true
            }
            None => false,
        }
    }

    fn take_timer(&mut self) -> Option<TimerHandle> {
        let timer = self.guard.as_mut()?.timer.take();
        if timer.is_some() {
            self.registry.armed.remove(&self.id);
        }
        timer
    }

    fn install(&mut self, schedule: CompiledSchedule, callback: TimerCallback) {
        let Some(slot) = self.guard.as_mut() else {
            return;
        };
        let handle = TimerHandle::spawn(self.id, schedule, callback);
        self.registry
            .armed
            .insert(self.id, handle.descriptor().to_string());
        slot.timer = Some(handle);
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        if guard.timer.is_none() {
            // Only the map and this guard reference the slot: nobody is waiting.
            let mutex = OwnedMutexGuard::mutex(&guard);
            self.registry.slots.remove_if(&self.id, |_, slot| {
                Arc::ptr_eq(slot, mutex) && Arc::strong_count(slot) == 2
            });
        }
        drop(guard);
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
