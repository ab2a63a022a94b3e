//! # postforge Scheduler
//!
//! Recurring content-generation job scheduler.
//!
//! Persisted job definitions are mapped to live cron timers with at most one
//! armed timer per job. Every generation trigger passes a single admission
//! check before any paid generation call is made.
//!
//! ## Architecture
//!
//! ```text
//!            create / update / delete / trigger_now / initialize_from_store
//!                                   │
//!                             ┌─────▼─────┐        ┌─────────────────────┐
//!                             │ Scheduler │        │ EmergencyController │
//!                             └─────┬─────┘        └──────────┬──────────┘
//!              ┌────────────────────┼──────────────────┬──────┘
//!        ┌─────▼──────┐     ┌───────▼────────┐   ┌─────▼───────┐
//!        │  JobStore  │◄────┤ ExecutionRunner├──►│ TriggerGate │
//!        └────────────┘     └───────┬────────┘   └─────────────┘
//!              ▲                    │
//!        ┌─────┴───────┐    ┌───────▼───────────┐
//!        │CronRegistry ├───►│ GenerationService │
//!        └─────────────┘    └───────────────────┘
//! ```
//!
//! - [`CronRegistry`] owns every [`TimerHandle`]; mutations for one job id are
//!   serialized through a per-id critical section, never a global lock.
//! - [`TriggerGate`] admits only the closed [`TriggerSource`] set.
//! - [`ExecutionRunner`] performs one bounded, cancellable generation call and
//!   applies the auto-pause policy.
//! - [`EmergencyController`] stops everything and reports lockdown.

pub mod emergency;
pub mod error;
pub mod gate;
pub mod generation;
pub mod job;
pub mod registry;
pub mod runner;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod timer;

#[cfg(test)]
pub(crate) mod test_support;

pub use emergency::{EmergencyController, LockdownStatus, StopReport};
pub use error::{
    AuthorizationError, GenerationError, RegistryError, SchedulerError, SchedulerResult,
    StoreError,
};
pub use gate::{Origin, SourceDescriptor, TriggerGate, TriggerRequest, TriggerSource};
pub use generation::{GenerationOutcome, GenerationRequest, GenerationService};
pub use job::{FormatFlags, GenerationParams, JobDefinition, JobId, ScheduledJob};
pub use registry::{CronRegistry, SlotGuard};
pub use runner::{ExecutionRunner, RunOutcome, RunPolicy, RunReport};
pub use schedule::{CompiledSchedule, ScheduleError, ScheduleExpression};
pub use scheduler::{BootReport, Scheduler};
pub use store::{JobStore, MemoryJobStore};
pub use timer::{TimerCallback, TimerHandle};
