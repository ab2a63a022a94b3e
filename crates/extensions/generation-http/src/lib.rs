//! HTTP generation service client for postforge.
//!
//! Posts each [`GenerationRequest`](postforge_scheduler::GenerationRequest) as
//! JSON to a configured endpoint and reads back a
//! [`GenerationOutcome`](postforge_scheduler::GenerationOutcome).

mod client;

pub use client::HttpGenerationService;
