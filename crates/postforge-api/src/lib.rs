//! # postforge API
//!
//! HTTP control surface for the postforge scheduler.
//!
//! ```text
//!   POST   /jobs               create a job
//!   GET    /jobs               list jobs
//!   GET    /jobs/{id}          fetch one job
//!   PUT    /jobs/{id}          replace a job definition
//!   DELETE /jobs/{id}          delete a job
//!   POST   /trigger/{id}       run a job now (identity from headers)
//!   GET    /status             armed timers, in-flight runs, lockdown
//!   POST   /emergency-stop     stop every timer and run
//!   POST   /emergency-resume   lift trigger suspension (operator only)
//!   GET    /health             liveness
//! ```
//!
//! Callers identify themselves with `x-trigger-source`. Operators present
//! `authorization: Bearer <token>`; webhooks sign the raw body with
//! HMAC-SHA256 in `x-signature-256: sha256=<hex>`. Nothing arriving over HTTP
//! is ever treated as an internal timer fire.

pub mod error;
pub mod http;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use http::identity::IdentityVerifier;
pub use http::routes::create_router;
pub use server::{ApiConfig, ApiServer};
pub use state::AppState;
