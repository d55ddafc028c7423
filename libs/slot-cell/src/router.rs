// libs/slot-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use shared_store::AppContext;

use crate::handlers;

pub fn slot_routes(state: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", post(handlers::create_slot))
        .route("/providers/{provider_id}", get(handlers::list_provider_slots))
        .route("/{slot_id}", get(handlers::get_slot))
        .route("/{slot_id}", put(handlers::update_slot))
        .route("/{slot_id}", delete(handlers::remove_slot))
        .route("/{slot_id}/book", post(handlers::book_slot))
        .route("/{slot_id}/release", post(handlers::release_slot))
        .with_state(state)
}
