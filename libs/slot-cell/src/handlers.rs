// libs/slot-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_store::AppContext;

use crate::models::{CreateSlotRequest, SlotError, UpdateSlotRequest};
use crate::services::SlotService;

#[axum::debug_handler]
pub async fn create_slot(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&ctx);

    let slot = service.create(request).await.map_err(slot_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn get_slot(
    State(ctx): State<Arc<AppContext>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&ctx);

    let slot = service.get(slot_id).await.map_err(slot_error)?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn update_slot(
    State(ctx): State<Arc<AppContext>>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<UpdateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&ctx);

    let slot = service.update(slot_id, request).await.map_err(slot_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn book_slot(
    State(ctx): State<Arc<AppContext>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&ctx);

    let slot = service.book(slot_id, None).await.map_err(slot_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn release_slot(
    State(ctx): State<Arc<AppContext>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&ctx);

    let slot = service.release(slot_id).await.map_err(slot_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn list_provider_slots(
    State(ctx): State<Arc<AppContext>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&ctx);

    let slots = service.list_for_provider(provider_id).await.map_err(slot_error)?;

    let total = slots.len();
    Ok(Json(json!({
        "slots": slots,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn remove_slot(
    State(ctx): State<Arc<AppContext>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SlotService::new(&ctx);

    service.remove(slot_id).await.map_err(slot_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Slot removed"
    })))
}

fn slot_error(e: SlotError) -> AppError {
    match e {
        SlotError::NotFound => AppError::NotFound("Slot not found".to_string()),
        SlotError::ProviderNotFound => AppError::NotFound("Provider not found".to_string()),
        SlotError::InvalidRange(msg) => AppError::BadRequest(msg),
        SlotError::Overlap { start, end } => AppError::Conflict(format!(
            "Slot overlaps an existing slot from {} to {}",
            start, end
        )),
        SlotError::SlotOccupied => AppError::Conflict("Slot is already booked".to_string()),
        SlotError::Directory(msg) => AppError::ExternalService(msg),
        SlotError::Storage(msg) => AppError::Internal(msg),
    }
}
