// libs/appointment-cell/src/services/queries.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use directory_cell::{DirectoryClient, DirectoryError, PatientSummary, ProviderSummary};
use shared_store::AppContext;

use crate::models::{Appointment, AppointmentDetails, AppointmentError, AppointmentStatus};
use crate::services::conflict::{decode, TABLE};

/// Read side of the scheduler.
///
/// Every listing is ordered by `scheduled_start` ascending and projects the
/// joined provider/patient records down to their public summaries.
pub struct AppointmentQueryService {
    ctx: Arc<AppContext>,
    directory: DirectoryClient,
}

impl AppointmentQueryService {
    pub fn new(ctx: &Arc<AppContext>) -> Self {
        Self {
            ctx: ctx.clone(),
            directory: DirectoryClient::new(ctx),
        }
    }

    pub async fn find_by_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let pid = provider_id.to_string();
        let appointments = self
            .collect(|row| row["provider_id"] == pid.as_str())
            .await?;
        self.to_details(appointments).await
    }

    pub async fn find_by_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let pid = patient_id.to_string();
        let appointments = self.collect(|row| row["patient_id"] == pid.as_str()).await?;
        self.to_details(appointments).await
    }

    pub async fn find_by_status(
        &self,
        status: AppointmentStatus,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let wanted = status.to_string();
        let appointments = self.collect(|row| row["status"] == wanted.as_str()).await?;
        self.to_details(appointments).await
    }

    /// Appointments starting inside `[from, to)`. Cancelled rows are
    /// included: date-range reads serve audit views, not the conflict check.
    pub async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let appointments = self.collect(|_| true).await?;
        let in_range = appointments
            .into_iter()
            .filter(|apt| apt.scheduled_start >= from && apt.scheduled_start < to)
            .collect();
        self.to_details(in_range).await
    }

    /// Appointments on the clock's current UTC calendar day.
    pub async fn find_today(&self) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let now = self.ctx.clock.now();
        let start_of_day = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        let end_of_day = start_of_day + Duration::days(1);

        debug!("Listing appointments for {}", now.date_naive());
        self.find_by_date_range(start_of_day, end_of_day).await
    }

    /// Non-cancelled appointments from now through the next seven days.
    pub async fn find_upcoming(&self) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let now = self.ctx.clock.now();
        let horizon = now + Duration::days(7);

        let appointments = self.collect(|_| true).await?;
        let upcoming = appointments
            .into_iter()
            .filter(|apt| apt.status != AppointmentStatus::Cancelled)
            .filter(|apt| apt.scheduled_start >= now && apt.scheduled_start < horizon)
            .collect();
        self.to_details(upcoming).await
    }

    async fn collect(
        &self,
        filter: impl Fn(&serde_json::Value) -> bool,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self.ctx.store.select(TABLE, filter).await;
        let mut appointments = rows
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<Appointment>, _>>()?;
        appointments.sort_by(|a, b| a.scheduled_start.cmp(&b.scheduled_start));
        Ok(appointments)
    }

    async fn to_details(
        &self,
        appointments: Vec<Appointment>,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let mut providers: HashMap<Uuid, ProviderSummary> = HashMap::new();
        let mut patients: HashMap<Uuid, PatientSummary> = HashMap::new();
        let mut details = Vec::with_capacity(appointments.len());

        for appointment in appointments {
            if !providers.contains_key(&appointment.provider_id) {
                let summary = self
                    .directory
                    .get_provider_summary(appointment.provider_id)
                    .await
                    .map_err(directory_error)?;
                providers.insert(appointment.provider_id, summary);
            }
            if !patients.contains_key(&appointment.patient_id) {
                let summary = self
                    .directory
                    .get_patient_summary(appointment.patient_id)
                    .await
                    .map_err(directory_error)?;
                patients.insert(appointment.patient_id, summary);
            }

            details.push(AppointmentDetails {
                id: appointment.id,
                scheduled_start: appointment.scheduled_start,
                scheduled_time: appointment.scheduled_time,
                duration_minutes: appointment.duration_minutes,
                reason: appointment.reason,
                status: appointment.status,
                priority: appointment.priority,
                parent_appointment_id: appointment.parent_appointment_id,
                provider: providers[&appointment.provider_id].clone(),
                patient: patients[&appointment.patient_id].clone(),
            });
        }

        Ok(details)
    }
}

fn directory_error(e: DirectoryError) -> AppointmentError {
    match e {
        DirectoryError::ProviderNotFound => AppointmentError::ProviderNotFound,
        DirectoryError::PatientNotFound => AppointmentError::PatientNotFound,
        DirectoryError::Unavailable(msg) => AppointmentError::Directory(msg),
    }
}
