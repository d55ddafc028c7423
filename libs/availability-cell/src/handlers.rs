// libs/availability-cell/src/handlers.rs
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

use crate::models::{AvailabilityError, DeclareAvailabilityRequest, UpdateAvailabilityRequest};
use crate::services::AvailabilityService;

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[axum::debug_handler]
pub async fn declare_availability(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<DeclareAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    let availability = service.declare(request).await.map_err(availability_error)?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(ctx): State<Arc<AppContext>>,
    Path(availability_id): Path<Uuid>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    let availability = service
        .update(availability_id, request)
        .await
        .map_err(availability_error)?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(ctx): State<Arc<AppContext>>,
    Path(availability_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    let availability = service.get(availability_id).await.map_err(availability_error)?;

    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn mark_availability_booked(
    State(ctx): State<Arc<AppContext>>,
    Path(availability_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    let availability = service
        .mark_booked(availability_id)
        .await
        .map_err(availability_error)?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn mark_availability_open(
    State(ctx): State<Arc<AppContext>>,
    Path(availability_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    let availability = service
        .mark_available(availability_id)
        .await
        .map_err(availability_error)?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn list_provider_availability(
    State(ctx): State<Arc<AppContext>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    let windows = service
        .list_for_provider(provider_id)
        .await
        .map_err(availability_error)?;

    let total = windows.len();
    Ok(Json(json!({
        "availability": windows,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn list_provider_open_availability(
    State(ctx): State<Arc<AppContext>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    let windows = service
        .list_available(provider_id)
        .await
        .map_err(availability_error)?;

    let total = windows.len();
    Ok(Json(json!({
        "availability": windows,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn list_availability_by_range(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    let windows = service
        .list_by_date_range(query.from, query.to)
        .await
        .map_err(availability_error)?;

    let total = windows.len();
    Ok(Json(json!({
        "availability": windows,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn list_open_availability_by_range(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    let windows = service
        .list_available_by_date_range(query.from, query.to)
        .await
        .map_err(availability_error)?;

    let total = windows.len();
    Ok(Json(json!({
        "availability": windows,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn remove_availability(
    State(ctx): State<Arc<AppContext>>,
    Path(availability_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&ctx);

    service.remove(availability_id).await.map_err(availability_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Availability window removed"
    })))
}

fn availability_error(e: AvailabilityError) -> AppError {
    match e {
        AvailabilityError::NotFound => AppError::NotFound("Availability window not found".to_string()),
        AvailabilityError::InvalidRange(msg) => AppError::BadRequest(msg),
        AvailabilityError::Overlap { start, end } => AppError::Conflict(format!(
            "Window overlaps an existing open window from {} to {}",
            start, end
        )),
        AvailabilityError::WindowBooked => {
            AppError::Conflict("Window is booked and cannot be modified".to_string())
        }
        AvailabilityError::Storage(msg) => AppError::Internal(msg),
    }
}
