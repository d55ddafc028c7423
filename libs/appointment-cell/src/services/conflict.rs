// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_store::AppContext;
use shared_utils::time::TimeRange;

use crate::models::{Appointment, AppointmentError, ConflictCheckResponse};

pub const TABLE: &str = "appointments";

pub struct ConflictDetectionService {
    ctx: Arc<AppContext>,
}

impl ConflictDetectionService {
    pub fn new(ctx: &Arc<AppContext>) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Find every appointment of `provider_id` whose interval overlaps the
    /// candidate window. Cancelled appointments no longer occupy their
    /// interval and are skipped; everything else counts, whatever its state.
    pub async fn check_conflicts(
        &self,
        provider_id: Uuid,
        window: TimeRange,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        debug!(
            "Checking conflicts for provider {} from {} to {}",
            provider_id, window.start, window.end
        );

        let existing = self.provider_appointments(provider_id).await?;

        let conflicting_appointments: Vec<Appointment> = existing
            .into_iter()
            .filter(|apt| Some(apt.id) != exclude_appointment_id)
            .filter(|apt| apt.status.blocks_timeline())
            .filter(|apt| window.overlaps(&apt.time_range()))
            .collect();

        let has_conflict = !conflicting_appointments.is_empty();
        if has_conflict {
            warn!(
                "Conflict detected for provider {} - {} conflicting appointments",
                provider_id,
                conflicting_appointments.len()
            );
        }

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicting_appointments,
        })
    }

    /// Like [`check_conflicts`], but collapses the response into the typed
    /// error the booking paths propagate.
    ///
    /// [`check_conflicts`]: Self::check_conflicts
    pub async fn ensure_free(
        &self,
        provider_id: Uuid,
        window: TimeRange,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let response = self
            .check_conflicts(provider_id, window, exclude_appointment_id)
            .await?;

        match response.conflicting_appointments.first() {
            Some(first) => Err(AppointmentError::SchedulingConflict {
                start: first.scheduled_start,
                end: first.scheduled_end(),
                conflicting_appointment_id: Some(first.id),
            }),
            None => Ok(()),
        }
    }

    async fn provider_appointments(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let pid = provider_id.to_string();
        let rows = self
            .ctx
            .store
            .select(TABLE, |row| row["provider_id"] == pid.as_str())
            .await;

        let mut appointments = rows
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<Appointment>, _>>()?;
        appointments.sort_by(|a, b| a.scheduled_start.cmp(&b.scheduled_start));
        Ok(appointments)
    }
}

pub(crate) fn decode(row: Value) -> Result<Appointment, AppointmentError> {
    serde_json::from_value(row)
        .map_err(|e| AppointmentError::Storage(format!("failed to parse appointment row: {}", e)))
}
