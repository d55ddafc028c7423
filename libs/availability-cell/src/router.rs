// libs/availability-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use shared_store::AppContext;

use crate::handlers;

pub fn availability_routes(state: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", post(handlers::declare_availability))
        .route("/range", get(handlers::list_availability_by_range))
        .route("/range/open", get(handlers::list_open_availability_by_range))
        .route("/providers/{provider_id}", get(handlers::list_provider_availability))
        .route(
            "/providers/{provider_id}/open",
            get(handlers::list_provider_open_availability),
        )
        .route("/{availability_id}", get(handlers::get_availability))
        .route("/{availability_id}", put(handlers::update_availability))
        .route("/{availability_id}", delete(handlers::remove_availability))
        .route("/{availability_id}/book", post(handlers::mark_availability_booked))
        .route("/{availability_id}/release", post(handlers::mark_availability_open))
        .with_state(state)
}
