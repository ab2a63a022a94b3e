//! Generation service boundary.
//!
//! Prompt construction and publishing live behind this trait; the scheduler
//! only hands over the job's parameters and reads back a summary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GenerationError;
use crate::job::{FormatFlags, JobId, ScheduledJob};

/// Parameters of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub job_id: JobId,
    pub run_id: Uuid,
    pub niches: Vec<String>,
    pub tones: Vec<String>,
    pub templates: Vec<String>,
    pub platforms: Vec<String>,
    pub ai_model: String,
    pub format: FormatFlags,
}

impl GenerationRequest {
    pub fn for_job(job: &ScheduledJob, run_id: Uuid) -> Self {
        let params = &job.params;
        Self {
            job_id: job.id,
            run_id,
            niches: params.niches.clone(),
            tones: params.tones.clone(),
            templates: params.templates.clone(),
            platforms: params.platforms.clone(),
            ai_model: params.ai_model.clone(),
            format: params.format.clone(),
        }
    }
}

/// Summary returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub success: bool,
    #[serde(default)]
    pub items_generated: u32,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl GenerationOutcome {
    pub fn succeeded(items_generated: u32) -> Self {
        Self {
            success: true,
            items_generated,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            success: false,
            items_generated: 0,
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }
}

/// External content generator.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError>;
}
