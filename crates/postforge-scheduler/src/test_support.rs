//! Shared doubles for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::emergency::EmergencyController;
use crate::error::{GenerationError, StoreError};
use crate::gate::{SourceDescriptor, TriggerGate, TriggerRequest};
use crate::generation::{GenerationOutcome, GenerationRequest, GenerationService};
use crate::job::{GenerationParams, JobDefinition, JobId, ScheduledJob};
use crate::registry::CronRegistry;
use crate::runner::{ExecutionRunner, RunPolicy};
use crate::schedule::ScheduleExpression;
use crate::scheduler::Scheduler;
use crate::store::{JobStore, MemoryJobStore};

pub(crate) fn sample_params() -> GenerationParams {
    GenerationParams {
        niches: vec!["beauty".to_string()],
        tones: vec!["friendly".to_string()],
        templates: vec!["listicle".to_string()],
        platforms: vec!["instagram".to_string()],
        ai_model: "gpt-4o-mini".to_string(),
        format: Default::default(),
    }
}

/// Active job firing daily at 23:59 UTC.
pub(crate) fn sample_definition(name: &str) -> JobDefinition {
    JobDefinition::new(name, ScheduleExpression::daily("23:59", "UTC"), sample_params())
}

/// Authenticated operator trigger for `job_id`.
pub(crate) fn interactive(job_id: JobId) -> TriggerRequest {
    TriggerRequest::new(
        job_id,
        SourceDescriptor::external(Some("interactive".to_string()), true),
    )
}

/// One scripted response.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    Succeed(u32),
    Report(Vec<String>),
    Error(String),
    Panic,
    Hang,
}

/// Generation double that replays scripted responses.
pub(crate) struct ScriptedGeneration {
    queue: Mutex<VecDeque<Script>>,
    fallback: Script,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGeneration {
    pub(crate) fn new(fallback: Script) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn succeeding() -> Self {
        Self::new(Script::Succeed(3))
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::new(Script::Error(message.to_string()))
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn then(self, script: Script) -> Self {
        self.queue.lock().push_back(script);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedGeneration {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let script = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match script {
            Script::Succeed(items) => Ok(GenerationOutcome::succeeded(items)),
            Script::Report(errors) => Ok(GenerationOutcome::failed(errors)),
            Script::Error(message) => Err(GenerationError::Request(message)),
            Script::Panic => panic!("scripted panic"),
            Script::Hang => futures::future::pending().await,
        }
    }
}

/// Memory store with switchable failures.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryJobStore,
    pub(crate) fail_reads: AtomicBool,
    pub(crate) fail_updates: AtomicBool,
    pub(crate) fail_deletes: AtomicBool,
    pub(crate) fail_inserts: AtomicBool,
    /// Milliseconds `get` sleeps before reading.
    pub(crate) get_delay_ms: AtomicU64,
    /// Milliseconds `insert` sleeps after the row is written.
    pub(crate) insert_delay_ms: AtomicU64,
}

impl FlakyStore {
    fn check(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Database(format!("{} failed", op)));
        }
        Ok(())
    }

    async fn pause(delay_ms: &AtomicU64) {
        let ms = delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn insert(&self, definition: &JobDefinition) -> Result<ScheduledJob, StoreError> {
        Self::check(&self.fail_inserts, "insert")?;
        let job = self.inner.insert(definition).await?;
        Self::pause(&self.insert_delay_ms).await;
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<ScheduledJob>, StoreError> {
        Self::check(&self.fail_reads, "get")?;
        Self::pause(&self.get_delay_ms).await;
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<ScheduledJob>, StoreError> {
        Self::check(&self.fail_reads, "list")?;
        self.inner.list().await
    }

    async fn update(&self, job: &ScheduledJob) -> Result<(), StoreError> {
        Self::check(&self.fail_updates, "update")?;
        self.inner.update(job).await
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        Self::check(&self.fail_deletes, "delete")?;
        self.inner.delete(id).await
    }
}

/// Fully wired component graph over a [`FlakyStore`].
pub(crate) struct Harness {
    pub(crate) store: Arc<FlakyStore>,
    pub(crate) registry: Arc<CronRegistry>,
    pub(crate) gate: Arc<TriggerGate>,
    pub(crate) generation: Arc<ScriptedGeneration>,
    pub(crate) runner: Arc<ExecutionRunner>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) emergency: EmergencyController,
}

pub(crate) fn harness(generation: ScriptedGeneration) -> Harness {
    harness_with_policy(generation, RunPolicy::default())
}

pub(crate) fn harness_with_policy(generation: ScriptedGeneration, policy: RunPolicy) -> Harness {
    let store = Arc::new(FlakyStore::default());
    let registry = Arc::new(CronRegistry::new());
    let gate = Arc::new(TriggerGate::permissive());
    let generation = Arc::new(generation);
    let runner = Arc::new(ExecutionRunner::new(
        store.clone(),
        registry.clone(),
        gate.clone(),
        generation.clone(),
        policy,
    ));
    let scheduler = Arc::new(Scheduler::new(runner.clone()));
    let emergency = EmergencyController::new(runner.clone(), Duration::from_secs(2));

    Harness {
        store,
        registry,
        gate,
        generation,
        runner,
        scheduler,
        emergency,
    }
}
