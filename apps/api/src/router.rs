use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use branch_cell::router::branch_routes;
use shared_config::AppConfig;
use staff_cell::router::staff_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Salon Platform API is running!" }))
        .nest("/branches", branch_routes(state.clone()))
        .nest("/staff", staff_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
}
