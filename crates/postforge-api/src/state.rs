//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use postforge_scheduler::{EmergencyController, Scheduler};

use crate::http::identity::IdentityVerifier;

/// State shared across handlers.
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub emergency: Arc<EmergencyController>,
    pub identity: IdentityVerifier,
    start_time: Instant,
}

impl AppState {
    pub fn new(
        scheduler: Arc<Scheduler>,
        emergency: Arc<EmergencyController>,
        identity: IdentityVerifier,
    ) -> Self {
        Self {
            scheduler,
            emergency,
            identity,
            start_time: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
