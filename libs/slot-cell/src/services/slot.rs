// libs/slot-cell/src/services/slot.rs
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use directory_cell::{DirectoryClient, DirectoryError};
use shared_store::AppContext;
use shared_utils::time::TimeRange;

use crate::models::{CreateSlotRequest, Slot, SlotError, UpdateSlotRequest};

pub const TABLE: &str = "slots";

pub struct SlotService {
    ctx: Arc<AppContext>,
    directory: DirectoryClient,
}

impl SlotService {
    pub fn new(ctx: &Arc<AppContext>) -> Self {
        Self {
            ctx: ctx.clone(),
            directory: DirectoryClient::new(ctx),
        }
    }

    /// Create a bookable slot for a provider.
    ///
    /// The provider reference is validated against the directory, and the
    /// slot must not overlap any existing slot of the same provider (the
    /// same discipline availability windows follow).
    pub async fn create(&self, request: CreateSlotRequest) -> Result<Slot, SlotError> {
        debug!(
            "Creating slot for provider {} on {} from {} to {}",
            request.provider_id, request.date, request.start_time, request.end_time
        );

        if request.end_time <= request.start_time {
            return Err(SlotError::InvalidRange(
                "end time must be after start time".to_string(),
            ));
        }

        self.verify_provider(request.provider_id).await?;

        let _guard = self.ctx.store.provider_lock(request.provider_id).await;

        let window = TimeRange::new(request.start_time, request.end_time);
        self.check_slot_conflicts(request.provider_id, window, None)
            .await?;

        let now = self.ctx.clock.now();
        let slot = Slot {
            id: Uuid::new_v4(),
            provider_id: request.provider_id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            is_booked: false,
            is_available: request.is_available.unwrap_or(true),
            appointment_id: None,
            created_at: now,
            updated_at: now,
        };

        let row = serde_json::to_value(&slot).map_err(|e| SlotError::Storage(e.to_string()))?;
        self.ctx
            .store
            .insert(TABLE, slot.id, row)
            .await
            .map_err(SlotError::from)?;

        debug!("Slot {} created", slot.id);
        Ok(slot)
    }

    /// Flip a slot to booked, recording the occupying appointment. The
    /// occupancy check and the flip run in one transaction so two racing
    /// book calls cannot both pass.
    pub async fn book(&self, slot_id: Uuid, appointment_id: Option<Uuid>) -> Result<Slot, SlotError> {
        let now = self.ctx.clock.now();

        let updated = self
            .ctx
            .store
            .with_write(|tx| -> Result<Value, SlotError> {
                let current = decode(tx.get(TABLE, slot_id).ok_or(SlotError::NotFound)?)?;
                if current.is_booked {
                    warn!("Attempt to book occupied slot {}", slot_id);
                    return Err(SlotError::SlotOccupied);
                }

                let patch = json!({
                    "is_booked": true,
                    "is_available": false,
                    "appointment_id": appointment_id,
                    "updated_at": now,
                });
                Ok(tx.merge(TABLE, slot_id, patch)?)
            })
            .await?;
        decode(updated)
    }

    /// Release a slot back to the open pool.
    pub async fn release(&self, slot_id: Uuid) -> Result<Slot, SlotError> {
        let patch = json!({
            "is_booked": false,
            "is_available": true,
            "appointment_id": null,
            "updated_at": self.ctx.clock.now(),
        });

        let updated = self
            .ctx
            .store
            .merge(TABLE, slot_id, patch)
            .await
            .map_err(SlotError::from)?;
        decode(updated)
    }

    pub async fn update(&self, slot_id: Uuid, request: UpdateSlotRequest) -> Result<Slot, SlotError> {
        debug!("Updating slot {}", slot_id);

        let current = self.get(slot_id).await?;

        let provider_id = request.provider_id.unwrap_or(current.provider_id);
        if provider_id != current.provider_id {
            self.verify_provider(provider_id).await?;
        }

        let _guard = self.ctx.store.provider_lock(provider_id).await;

        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);
        let time_changed = start_time != current.start_time
            || end_time != current.end_time
            || provider_id != current.provider_id;

        if time_changed {
            if end_time <= start_time {
                return Err(SlotError::InvalidRange(
                    "end time must be after start time".to_string(),
                ));
            }
            self.check_slot_conflicts(
                provider_id,
                TimeRange::new(start_time, end_time),
                Some(slot_id),
            )
            .await?;
        }

        let mut patch = serde_json::Map::new();
        if let Some(provider) = request.provider_id {
            patch.insert("provider_id".to_string(), json!(provider));
        }
        if let Some(date) = request.date {
            patch.insert("date".to_string(), json!(date));
        }
        if let Some(start) = request.start_time {
            patch.insert("start_time".to_string(), json!(start));
        }
        if let Some(end) = request.end_time {
            patch.insert("end_time".to_string(), json!(end));
        }
        if let Some(is_available) = request.is_available {
            patch.insert("is_available".to_string(), json!(is_available));
        }
        patch.insert("updated_at".to_string(), json!(self.ctx.clock.now()));

        let updated = self
            .ctx
            .store
            .merge(TABLE, slot_id, Value::Object(patch))
            .await
            .map_err(SlotError::from)?;
        decode(updated)
    }

    pub async fn get(&self, slot_id: Uuid) -> Result<Slot, SlotError> {
        let row = self
            .ctx
            .store
            .get(TABLE, slot_id)
            .await
            .ok_or(SlotError::NotFound)?;
        decode(row)
    }

    pub async fn list_for_provider(&self, provider_id: Uuid) -> Result<Vec<Slot>, SlotError> {
        let pid = provider_id.to_string();
        let rows = self
            .ctx
            .store
            .select(TABLE, |row| row["provider_id"] == pid.as_str())
            .await;

        let mut slots = rows
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<Slot>, _>>()?;
        slots.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(slots)
    }

    /// Delete a slot. A booked slot stays until its appointment releases it.
    pub async fn remove(&self, slot_id: Uuid) -> Result<(), SlotError> {
        let current = self.get(slot_id).await?;
        if current.is_booked {
            return Err(SlotError::SlotOccupied);
        }

        if !self.ctx.store.remove(TABLE, slot_id).await {
            return Err(SlotError::NotFound);
        }

        debug!("Slot {} removed", slot_id);
        Ok(())
    }

    async fn verify_provider(&self, provider_id: Uuid) -> Result<(), SlotError> {
        match self.directory.provider_exists(provider_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SlotError::ProviderNotFound),
            Err(DirectoryError::Unavailable(msg)) => Err(SlotError::Directory(msg)),
            Err(other) => Err(SlotError::Directory(other.to_string())),
        }
    }

    async fn check_slot_conflicts(
        &self,
        provider_id: Uuid,
        window: TimeRange,
        exclude_id: Option<Uuid>,
    ) -> Result<(), SlotError> {
        let pid = provider_id.to_string();
        let rows = self
            .ctx
            .store
            .select(TABLE, |row| row["provider_id"] == pid.as_str())
            .await;

        for row in rows {
            let existing = decode(row)?;
            if Some(existing.id) == exclude_id {
                continue;
            }
            if window.overlaps(&existing.window()) {
                warn!(
                    "Slot conflict for provider {}: {} - {} overlaps {} - {}",
                    provider_id, window.start, window.end, existing.start_time, existing.end_time
                );
                return Err(SlotError::Overlap {
                    start: existing.start_time,
                    end: existing.end_time,
                });
            }
        }

        Ok(())
    }
}

fn decode(row: Value) -> Result<Slot, SlotError> {
    serde_json::from_value(row)
        .map_err(|e| SlotError::Storage(format!("failed to parse slot row: {}", e)))
}
