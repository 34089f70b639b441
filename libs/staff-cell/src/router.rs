// libs/staff-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn staff_routes(state: Arc<AppConfig>) -> Router {
    // All staff operations require authentication
    let protected_routes = Router::new()
        .route("/", get(handlers::list_staff))
        .route("/", post(handlers::create_staff))
        .route("/leave-requests", post(handlers::submit_leave_request))
        .route("/leave-requests", get(handlers::list_leave_requests))
        .route("/leave-requests/{request_id}", patch(handlers::decide_leave_request))
        .route("/{staff_id}", get(handlers::get_staff))
        .route("/{staff_id}", patch(handlers::update_staff))
        .route("/{staff_id}/leave-requests", get(handlers::get_staff_leave_requests))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
