// libs/branch-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn branch_routes(state: Arc<AppConfig>) -> Router {
    // All branch operations require authentication
    let protected_routes = Router::new()
        .route("/", get(handlers::list_branches))
        .route("/", post(handlers::create_branch))
        .route("/{branch_id}", get(handlers::get_branch))
        .route("/{branch_id}", patch(handlers::update_branch))
        .route("/{branch_id}/business-hours", post(handlers::set_business_hours))
        .route("/{branch_id}/business-hours", get(handlers::get_business_hours))
        .route("/{branch_id}/holidays", post(handlers::create_holiday))
        .route("/{branch_id}/holidays", get(handlers::list_holidays))
        .route("/{branch_id}/holidays/{holiday_id}", delete(handlers::delete_holiday))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
