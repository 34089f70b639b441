// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        // Core booking lifecycle
        .route("/", post(handlers::book_appointment))
        .route("/availability", get(handlers::check_availability))
        .route("/search", get(handlers::search_appointments))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        // Reschedule request workflow
        .route("/reschedule-requests", post(handlers::propose_reschedule))
        .route("/reschedule-requests", get(handlers::list_reschedule_requests))
        .route("/reschedule-requests/{request_id}", patch(handlers::decide_reschedule))
        // Per-appointment operations
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", patch(handlers::update_schedule))
        .route("/{appointment_id}/status", patch(handlers::update_status))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/rating", post(handlers::rate_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
