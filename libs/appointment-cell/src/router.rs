// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_store::AppContext;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppContext>) -> Router {
    Router::new()
        // Core appointment management
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", put(handlers::update_appointment))
        .route("/{appointment_id}", delete(handlers::remove_appointment))
        .route(
            "/{appointment_id}/reschedule",
            patch(handlers::reschedule_appointment),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        // Appointment listings
        .route("/providers/{provider_id}", get(handlers::get_provider_appointments))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/status/{status}", get(handlers::get_appointments_by_status))
        .route("/range", get(handlers::get_appointments_by_range))
        .route("/today", get(handlers::get_today_appointments))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        // Utility endpoints
        .route("/conflicts/check", get(handlers::check_appointment_conflicts))
        .with_state(state)
}
