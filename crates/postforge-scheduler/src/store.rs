//! Job persistence.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::job::{JobDefinition, JobId, ScheduledJob};

/// Durable storage for job definitions and run statistics.
///
/// Writes are last-writer-wins; callers serialize writes per id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job and return it with its assigned id.
    async fn insert(&self, definition: &JobDefinition) -> Result<ScheduledJob, StoreError>;

    /// Load a job by id.
    async fn get(&self, id: JobId) -> Result<Option<ScheduledJob>, StoreError>;

    /// Load all jobs ordered by id.
    async fn list(&self) -> Result<Vec<ScheduledJob>, StoreError>;

    /// Load all jobs with `is_active = true`.
    async fn list_active(&self) -> Result<Vec<ScheduledJob>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|job| job.is_active)
            .collect())
    }

    /// Overwrite an existing row. Fails with `NotFound` if it is gone.
    async fn update(&self, job: &ScheduledJob) -> Result<(), StoreError>;

    /// Delete a row. Returns whether it existed.
    async fn delete(&self, id: JobId) -> Result<bool, StoreError>;
}

/// In-memory job store for tests and ephemeral runs.
pub struct MemoryJobStore {
    jobs: RwLock<BTreeMap<JobId, ScheduledJob>>,
    next_id: AtomicI64,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, definition: &JobDefinition) -> Result<ScheduledJob, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = ScheduledJob::from_definition(id, definition, Utc::now());
        self.jobs.write().await.insert(id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<ScheduledJob>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<ScheduledJob>, StoreError> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn update(&self, job: &ScheduledJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(job.id)),
        }
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
