// libs/availability-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_store::{AppContext, StoreError};
use shared_utils::time::TimeRange;

use crate::models::{
    Availability, AvailabilityError, AvailabilityStatus, DeclareAvailabilityRequest,
    UpdateAvailabilityRequest,
};

pub const TABLE: &str = "availability";

pub struct AvailabilityService {
    ctx: Arc<AppContext>,
}

impl AvailabilityService {
    pub fn new(ctx: &Arc<AppContext>) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Declare a new open window for a provider.
    ///
    /// The window must not overlap any other `available` window of the same
    /// provider; the check-then-insert runs under the provider's timeline
    /// lock.
    pub async fn declare(
        &self,
        request: DeclareAvailabilityRequest,
    ) -> Result<Availability, AvailabilityError> {
        debug!(
            "Declaring availability for provider {} from {} to {}",
            request.provider_id, request.start_time, request.end_time
        );

        if request.end_time <= request.start_time {
            return Err(AvailabilityError::InvalidRange(
                "end time must be after start time".to_string(),
            ));
        }

        let _guard = self.ctx.store.provider_lock(request.provider_id).await;

        let window = TimeRange::new(request.start_time, request.end_time);
        self.check_window_conflicts(request.provider_id, window, None)
            .await?;

        let now = self.ctx.clock.now();
        let availability = Availability {
            id: Uuid::new_v4(),
            provider_id: request.provider_id,
            start_time: request.start_time,
            end_time: request.end_time,
            kind: request.kind,
            status: AvailabilityStatus::Available,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        let row = serde_json::to_value(&availability)
            .map_err(|e| AvailabilityError::Storage(e.to_string()))?;
        self.ctx
            .store
            .insert(TABLE, availability.id, row)
            .await
            .map_err(storage_error)?;

        debug!("Availability {} declared", availability.id);
        Ok(availability)
    }

    /// Apply a partial update; a time edit re-runs the overlap check against
    /// every other window of the provider and is only legal while the window
    /// is still `available`.
    pub async fn update(
        &self,
        availability_id: Uuid,
        request: UpdateAvailabilityRequest,
    ) -> Result<Availability, AvailabilityError> {
        debug!("Updating availability {}", availability_id);

        let current = self.get(availability_id).await?;

        let _guard = self.ctx.store.provider_lock(current.provider_id).await;

        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);
        let time_changed = start_time != current.start_time || end_time != current.end_time;

        if time_changed {
            if end_time <= start_time {
                return Err(AvailabilityError::InvalidRange(
                    "end time must be after start time".to_string(),
                ));
            }
            if current.status != AvailabilityStatus::Available {
                return Err(AvailabilityError::WindowBooked);
            }
            self.check_window_conflicts(
                current.provider_id,
                TimeRange::new(start_time, end_time),
                Some(availability_id),
            )
            .await?;
        }

        let mut patch = serde_json::Map::new();
        if let Some(start) = request.start_time {
            patch.insert("start_time".to_string(), json!(start));
        }
        if let Some(end) = request.end_time {
            patch.insert("end_time".to_string(), json!(end));
        }
        if let Some(kind) = request.kind {
            patch.insert("kind".to_string(), json!(kind));
        }
        if let Some(notes) = request.notes {
            patch.insert("notes".to_string(), json!(notes));
        }
        patch.insert("updated_at".to_string(), json!(self.ctx.clock.now()));

        let updated = self
            .ctx
            .store
            .merge(TABLE, availability_id, Value::Object(patch))
            .await
            .map_err(storage_error)?;

        decode(updated)
    }

    pub async fn mark_booked(&self, availability_id: Uuid) -> Result<Availability, AvailabilityError> {
        self.set_status(availability_id, AvailabilityStatus::Booked).await
    }

    pub async fn mark_available(
        &self,
        availability_id: Uuid,
    ) -> Result<Availability, AvailabilityError> {
        self.set_status(availability_id, AvailabilityStatus::Available).await
    }

    pub async fn get(&self, availability_id: Uuid) -> Result<Availability, AvailabilityError> {
        let row = self
            .ctx
            .store
            .get(TABLE, availability_id)
            .await
            .ok_or(AvailabilityError::NotFound)?;
        decode(row)
    }

    pub async fn list_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<Availability>, AvailabilityError> {
        let pid = provider_id.to_string();
        let rows = self
            .ctx
            .store
            .select(TABLE, |row| row["provider_id"] == pid.as_str())
            .await;

        sorted(rows)
    }

    /// Open windows for a provider that have not yet started.
    pub async fn list_available(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<Availability>, AvailabilityError> {
        let now = self.ctx.clock.now();
        let windows = self.list_for_provider(provider_id).await?;

        Ok(windows
            .into_iter()
            .filter(|w| w.status == AvailabilityStatus::Available && w.start_time >= now)
            .collect())
    }

    pub async fn list_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Availability>, AvailabilityError> {
        let rows = self.ctx.store.select(TABLE, |_| true).await;
        let windows = sorted(rows)?;

        Ok(windows
            .into_iter()
            .filter(|w| w.start_time >= from && w.start_time < to)
            .collect())
    }

    pub async fn list_available_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Availability>, AvailabilityError> {
        let windows = self.list_by_date_range(from, to).await?;

        Ok(windows
            .into_iter()
            .filter(|w| w.status == AvailabilityStatus::Available)
            .collect())
    }

    /// Delete a window. Booked windows cannot be removed until the
    /// consuming appointment releases them.
    pub async fn remove(&self, availability_id: Uuid) -> Result<(), AvailabilityError> {
        let current = self.get(availability_id).await?;
        if current.status == AvailabilityStatus::Booked {
            return Err(AvailabilityError::WindowBooked);
        }

        if !self.ctx.store.remove(TABLE, availability_id).await {
            return Err(AvailabilityError::NotFound);
        }

        debug!("Availability {} removed", availability_id);
        Ok(())
    }

    async fn set_status(
        &self,
        availability_id: Uuid,
        status: AvailabilityStatus,
    ) -> Result<Availability, AvailabilityError> {
        let patch = json!({
            "status": status,
            "updated_at": self.ctx.clock.now(),
        });

        let updated = self
            .ctx
            .store
            .merge(TABLE, availability_id, patch)
            .await
            .map_err(storage_error)?;

        decode(updated)
    }

    async fn check_window_conflicts(
        &self,
        provider_id: Uuid,
        window: TimeRange,
        exclude_id: Option<Uuid>,
    ) -> Result<(), AvailabilityError> {
        let pid = provider_id.to_string();
        let rows = self
            .ctx
            .store
            .select(TABLE, |row| {
                row["provider_id"] == pid.as_str() && row["status"] == "available"
            })
            .await;

        for row in rows {
            let existing = decode(row)?;
            if Some(existing.id) == exclude_id {
                continue;
            }
            if window.overlaps(&existing.window()) {
                warn!(
                    "Availability conflict for provider {}: window {} - {} overlaps {} - {}",
                    provider_id, window.start, window.end, existing.start_time, existing.end_time
                );
                return Err(AvailabilityError::Overlap {
                    start: existing.start_time,
                    end: existing.end_time,
                });
            }
        }

        Ok(())
    }
}

fn decode(row: Value) -> Result<Availability, AvailabilityError> {
    serde_json::from_value(row)
        .map_err(|e| AvailabilityError::Storage(format!("failed to parse availability row: {}", e)))
}

fn sorted(rows: Vec<Value>) -> Result<Vec<Availability>, AvailabilityError> {
    let mut windows = rows
        .into_iter()
        .map(decode)
        .collect::<Result<Vec<Availability>, _>>()?;
    windows.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    Ok(windows)
}

fn storage_error(e: StoreError) -> AvailabilityError {
    match e {
        StoreError::RowMissing(_) => AvailabilityError::NotFound,
        other => AvailabilityError::Storage(other.to_string()),
    }
}
