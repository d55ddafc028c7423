// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_store::AppContext;

use crate::models::{
    AppointmentError, AppointmentStatus, CancelAppointmentRequest, CreateAppointmentRequest,
    RescheduleAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::queries::AppointmentQueryService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub provider_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);

    let appointment = service
        .create_appointment(request)
        .await
        .map_err(appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(ctx): State<Arc<AppContext>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);

    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(ctx): State<Arc<AppContext>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);

    let appointment = service
        .update_appointment(appointment_id, request)
        .await
        .map_err(appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(ctx): State<Arc<AppContext>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);

    let replacement = service
        .reschedule_appointment(appointment_id, request)
        .await
        .map_err(appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": replacement,
        "message": "Appointment rescheduled"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(ctx): State<Arc<AppContext>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);

    let appointment = service
        .cancel_appointment(appointment_id, request)
        .await
        .map_err(appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn remove_appointment(
    State(ctx): State<Arc<AppContext>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);

    service
        .remove_appointment(appointment_id)
        .await
        .map_err(appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment removed"
    })))
}

#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);

    let response = service
        .check_conflicts(
            query.provider_id,
            query.start_time,
            query.end_time,
            query.exclude_appointment_id,
        )
        .await
        .map_err(appointment_error)?;

    Ok(Json(json!(response)))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_provider_appointments(
    State(ctx): State<Arc<AppContext>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueryService::new(&ctx);

    let appointments = service
        .find_by_provider(provider_id)
        .await
        .map_err(appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(ctx): State<Arc<AppContext>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueryService::new(&ctx);

    let appointments = service
        .find_by_patient(patient_id)
        .await
        .map_err(appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn get_appointments_by_status(
    State(ctx): State<Arc<AppContext>>,
    Path(status): Path<AppointmentStatus>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueryService::new(&ctx);

    let appointments = service
        .find_by_status(status)
        .await
        .map_err(appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn get_appointments_by_range(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueryService::new(&ctx);

    let appointments = service
        .find_by_date_range(query.from, query.to)
        .await
        .map_err(appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn get_today_appointments(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueryService::new(&ctx);

    let appointments = service.find_today().await.map_err(appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueryService::new(&ctx);

    let appointments = service.find_upcoming().await.map_err(appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
    })))
}

fn appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::SlotNotFound => AppError::NotFound("Slot not found".to_string()),
        AppointmentError::AvailabilityNotFound => {
            AppError::NotFound("Availability window not found".to_string())
        }
        AppointmentError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        AppointmentError::ProviderNotFound => AppError::NotFound("Provider not found".to_string()),
        AppointmentError::InvalidTime(msg) => AppError::BadRequest(msg),
        AppointmentError::SchedulingConflict { start, end, .. } => AppError::Conflict(format!(
            "Appointment conflicts with an existing booking from {} to {}",
            start, end
        )),
        AppointmentError::InvalidStatusTransition(status) => AppError::Conflict(format!(
            "Appointment cannot be modified in current status: {}",
            status
        )),
        AppointmentError::Directory(msg) => AppError::ExternalService(msg),
        AppointmentError::ExternalService(msg) => AppError::ExternalService(msg),
        AppointmentError::Storage(msg) => AppError::Internal(msg),
    }
}
