//! Trigger admission.
//!
//! Every path that can start a paid generation run passes a [`TriggerRequest`]
//! through [`TriggerGate::check`]. The gate is deny-by-default over a closed
//! set of [`TriggerSource`]s and knows nothing about transports.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AuthorizationError, SchedulerError, SchedulerResult};
use crate::job::JobId;

/// Recognized trigger sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    /// An operator session.
    Interactive,
    /// A signed inbound webhook.
    Webhook,
    /// A timer fire inside this process.
    Scheduler,
}

impl TriggerSource {
    pub const ALL: [TriggerSource; 3] = [
        TriggerSource::Interactive,
        TriggerSource::Webhook,
        TriggerSource::Scheduler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Interactive => "interactive",
            TriggerSource::Webhook => "webhook",
            TriggerSource::Scheduler => "scheduler",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interactive" => Ok(TriggerSource::Interactive),
            "webhook" => Ok(TriggerSource::Webhook),
            "scheduler" => Ok(TriggerSource::Scheduler),
            other => Err(format!("unknown trigger source '{}'", other)),
        }
    }
}

/// Where a request entered the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Produced by this process (timer fires).
    Internal,
    /// Arrived over a transport.
    External,
}

/// Caller identity as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Claimed source kind, unparsed.
    pub kind: Option<String>,
    pub origin: Origin,
    /// Whether the transport verified the caller's credential.
    pub authenticated: bool,
}

impl SourceDescriptor {
    /// The identity used by timer fires.
    pub fn internal() -> Self {
        Self {
            kind: Some(TriggerSource::Scheduler.as_str().to_string()),
            origin: Origin::Internal,
            authenticated: true,
        }
    }

    /// An identity claimed by an external caller.
    pub fn external(kind: Option<String>, authenticated: bool) -> Self {
        Self {
            kind,
            origin: Origin::External,
            authenticated,
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.origin {
            Origin::Internal => "internal",
            Origin::External => "external",
        };
        write!(
            f,
            "kind={} origin={} authenticated={}",
            self.kind.as_deref().unwrap_or("<none>"),
            origin,
            self.authenticated
        )
    }
}

/// A request to start a run.
#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub job_id: JobId,
    pub descriptor: SourceDescriptor,
    pub received_at: DateTime<Utc>,
}

impl TriggerRequest {
    pub fn new(job_id: JobId, descriptor: SourceDescriptor) -> Self {
        Self {
            job_id,
            descriptor,
            received_at: Utc::now(),
        }
    }

    /// Timer fire for `job_id`.
    pub fn internal(job_id: JobId) -> Self {
        Self::new(job_id, SourceDescriptor::internal())
    }
}

/// Deny-by-default trigger classifier.
pub struct TriggerGate {
    allowed: HashSet<TriggerSource>,
    suspended: AtomicBool,
    denied: AtomicU64,
}

impl TriggerGate {
    /// Gate admitting only `allowed`.
    pub fn new(allowed: impl IntoIterator<Item = TriggerSource>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            suspended: AtomicBool::new(false),
            denied: AtomicU64::new(0),
        }
    }

    /// Gate admitting every recognized source.
    pub fn permissive() -> Self {
        Self::new(TriggerSource::ALL)
    }

    /// Build from configured names. Unknown names are a configuration error.
    pub fn from_names(names: &[String]) -> SchedulerResult<Self> {
        let allowed = names
            .iter()
            .map(|name| name.trim().parse::<TriggerSource>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(SchedulerError::Config)?;
        Ok(Self::new(allowed))
    }

    /// Admit or reject a request.
    pub fn check(&self, request: &TriggerRequest) -> Result<TriggerSource, AuthorizationError> {
        self.classify(&request.descriptor).inspect_err(|err| {
            warn!(
                job_id = request.job_id,
                descriptor = %err.descriptor,
                reason = %err.reason,
                "Trigger denied"
            );
        })
    }

    /// Classify a descriptor without a job context.
    pub fn classify(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<TriggerSource, AuthorizationError> {
        let result = self.evaluate(descriptor);
        if result.is_err() {
            self.denied.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn evaluate(&self, descriptor: &SourceDescriptor) -> Result<TriggerSource, AuthorizationError> {
        let deny = |reason: String| AuthorizationError {
            reason,
            descriptor: descriptor.clone(),
        };

        let Some(kind) = descriptor.kind.as_deref() else {
            return Err(deny("missing trigger source".to_string()));
        };

        let source = kind
            .parse::<TriggerSource>()
            .map_err(|_| deny(format!("unrecognized trigger source '{}'", kind)))?;

        if !self.allowed.contains(&source) {
            return Err(deny(format!("trigger source '{}' is not allowed", source)));
        }

        match source {
            TriggerSource::Scheduler if descriptor.origin == Origin::External => {
                return Err(deny(
                    "scheduler source cannot be asserted by an external caller".to_string(),
                ));
            }
            TriggerSource::Interactive | TriggerSource::Webhook if !descriptor.authenticated => {
                return Err(deny(format!("trigger source '{}' is not authenticated", source)));
            }
            _ => {}
        }

        if source != TriggerSource::Scheduler && self.is_suspended() {
            return Err(deny("triggers are suspended by an emergency stop".to_string()));
        }

        Ok(source)
    }

    /// Reject every non-scheduler source until [`resume`](Self::resume).
    pub fn suspend(&self) {
        if !self.suspended.swap(true, Ordering::SeqCst) {
            info!("Trigger gate suspended");
        }
    }

    pub fn resume(&self) {
        if self.suspended.swap(false, Ordering::SeqCst) {
            info!("Trigger gate resumed");
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn allows(&self, source: TriggerSource) -> bool {
        self.allowed.contains(&source)
    }

    /// Total denials since start.
    pub fn denied_count(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
