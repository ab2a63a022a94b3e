//! Router construction.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::state::AppState;

/// Build the control router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let job_routes = Router::new()
        .route("/", post(handlers::create_job).get(handlers::list_jobs))
        .route(
            "/{id}",
            get(handlers::get_job)
                .put(handlers::update_job)
                .delete(handlers::delete_job),
        )
        .with_state(state.clone());

    let control_routes = Router::new()
        .route("/trigger/{id}", post(handlers::trigger_job))
        .route("/status", get(handlers::status))
        .route("/emergency-stop", post(handlers::emergency_stop))
        .route("/emergency-resume", post(handlers::emergency_resume))
        .route("/health", get(handlers::health))
        .with_state(state);

    Router::new()
        .nest("/jobs", job_routes)
        .merge(control_routes)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
