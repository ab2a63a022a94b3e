//! Job definition and persisted job state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};
use crate::schedule::{CompiledSchedule, ScheduleExpression};

/// Store-assigned job identifier.
pub type JobId = i64;

/// Output formatting switches passed through to generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatFlags {
    #[serde(default)]
    pub use_hashtags: bool,
    #[serde(default)]
    pub use_emojis: bool,
    #[serde(default)]
    pub spartan_format: bool,
}

/// What to generate on each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub niches: Vec<String>,
    #[serde(default)]
    pub tones: Vec<String>,
    pub templates: Vec<String>,
    pub platforms: Vec<String>,
    pub ai_model: String,
    #[serde(default)]
    pub format: FormatFlags,
}

/// Caller-supplied part of a job, used by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub schedule: ScheduleExpression,
    pub params: GenerationParams,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl JobDefinition {
    /// Create an active definition.
    pub fn new(
        name: impl Into<String>,
        schedule: ScheduleExpression,
        params: GenerationParams,
    ) -> Self {
        Self {
            name: name.into(),
            schedule,
            params,
            is_active: true,
        }
    }

    /// Set active state.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Check required fields and compile the schedule.
    pub fn validate(&self) -> SchedulerResult<CompiledSchedule> {
        if self.name.trim().is_empty() {
            return Err(SchedulerError::validation("name", "must not be empty"));
        }
        if self.params.ai_model.trim().is_empty() {
            return Err(SchedulerError::validation("params.ai_model", "must not be empty"));
        }
        require_entries("params.niches", &self.params.niches)?;
        require_entries("params.templates", &self.params.templates)?;
        require_entries("params.platforms", &self.params.platforms)?;
        if self.params.tones.iter().any(|t| t.trim().is_empty()) {
            return Err(SchedulerError::validation(
                "params.tones",
                "must not contain blank entries",
            ));
        }

        Ok(self.schedule.compile()?)
    }
}

fn require_entries(field: &str, values: &[String]) -> SchedulerResult<()> {
    if values.is_empty() {
        return Err(SchedulerError::validation(field, "must not be empty"));
    }
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(SchedulerError::validation(field, "must not contain blank entries"));
    }
    Ok(())
}

/// A persisted job with its run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub name: String,
    pub schedule: ScheduleExpression,
    pub params: GenerationParams,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub total_runs: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl ScheduledJob {
    /// Build a fresh row for `definition` with zeroed statistics.
    pub fn from_definition(id: JobId, definition: &JobDefinition, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: definition.name.clone(),
            schedule: definition.schedule.clone(),
            params: definition.params.clone(),
            is_active: definition.is_active,
            created_at: now,
            updated_at: now,
            last_run_at: None,
            total_runs: 0,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    /// The caller-editable part of this job.
    pub fn definition(&self) -> JobDefinition {
        JobDefinition {
            name: self.name.clone(),
            schedule: self.schedule.clone(),
            params: self.params.clone(),
            is_active: self.is_active,
        }
    }

    /// Overwrite the definition, keeping run statistics.
    ///
    /// Re-enabling a paused job clears its failure streak so it gets a
    /// full threshold again.
    pub fn apply_definition(&mut self, definition: &JobDefinition, now: DateTime<Utc>) {
        if definition.is_active && !self.is_active {
            self.consecutive_failures = 0;
        }
        self.name = definition.name.clone();
        self.schedule = definition.schedule.clone();
        self.params = definition.params.clone();
        self.is_active = definition.is_active;
        self.updated_at = now;
    }

    /// Record a successful run.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.total_runs += 1;
        self.last_run_at = Some(now);
        self.consecutive_failures = 0;
        self.last_error = None;
        self.updated_at = now;
    }

    /// Record a failed run. Returns `true` when this failure auto-paused the job.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
        threshold: u32,
    ) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.into());
        self.updated_at = now;

        if self.is_active && self.consecutive_failures >= threshold {
            self.is_active = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
