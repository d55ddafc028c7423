// libs/slot-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_utils::time::TimeRange;

/// A discrete bookable unit of a provider's time.
///
/// Slots are what a patient actually books; `appointment_id` points at the
/// appointment occupying a booked slot so cancellation can release it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_booked: bool,
    pub is_available: bool,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn window(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    pub provider_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum SlotError {
    #[error("Slot not found")]
    NotFound,

    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    #[error("Slot overlaps an existing slot from {start} to {end}")]
    Overlap {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Slot is already booked")]
    SlotOccupied,

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<shared_store::StoreError> for SlotError {
    fn from(e: shared_store::StoreError) -> Self {
        match e {
            shared_store::StoreError::RowMissing(_) => SlotError::NotFound,
            other => SlotError::Storage(other.to_string()),
        }
    }
}
