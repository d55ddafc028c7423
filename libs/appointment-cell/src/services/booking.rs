// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::models::{Availability, AvailabilityStatus};
use availability_cell::services::availability::TABLE as AVAILABILITY_TABLE;
use directory_cell::DirectoryClient;
use shared_store::{AppContext, Transaction};
use shared_utils::time::TimeRange;
use slot_cell::models::Slot;
use slot_cell::services::slot::TABLE as SLOTS_TABLE;

use crate::models::{
    Appointment, AppointmentError, AppointmentEvent, AppointmentStatus, CancelAppointmentRequest,
    ConflictCheckResponse, CreateAppointmentRequest, RescheduleAppointmentRequest,
    UpdateAppointmentRequest,
};
use crate::services::conflict::{decode, ConflictDetectionService, TABLE as APPOINTMENTS_TABLE};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notify::NotificationClient;
use crate::services::telemedicine::MeetingProvisioner;

pub struct AppointmentBookingService {
    ctx: Arc<AppContext>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    directory: DirectoryClient,
    notifier: NotificationClient,
    provisioner: MeetingProvisioner,
}

impl AppointmentBookingService {
    pub fn new(ctx: &Arc<AppContext>) -> Self {
        Self {
            ctx: ctx.clone(),
            conflict_service: ConflictDetectionService::new(ctx),
            lifecycle_service: AppointmentLifecycleService::new(),
            directory: DirectoryClient::new(ctx),
            notifier: NotificationClient::new(ctx),
            provisioner: MeetingProvisioner::new(ctx),
        }
    }

    /// Book an appointment.
    ///
    /// The conflict check and the insert run under the provider's timeline
    /// lock; when the request binds a slot or an availability window, those
    /// are consumed inside the same transaction as the insert, so two racing
    /// requests for the same slot cannot both succeed.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with provider {} at {}",
            request.patient_id, request.provider_id, request.scheduled_start
        );

        if request.duration_minutes <= 0 {
            return Err(AppointmentError::InvalidTime(
                "duration must be a positive number of minutes".to_string(),
            ));
        }

        futures::try_join!(
            self.verify_patient(request.patient_id),
            self.verify_provider(request.provider_id)
        )?;

        let window = TimeRange::from_duration(request.scheduled_start, request.duration_minutes);

        let guard = self.ctx.store.provider_lock(request.provider_id).await;

        self.conflict_service
            .ensure_free(request.provider_id, window, None)
            .await?;

        let now = self.ctx.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            provider_id: request.provider_id,
            scheduled_start: request.scheduled_start,
            scheduled_time: display_time(request.scheduled_start),
            duration_minutes: request.duration_minutes,
            reason: request.reason,
            status: AppointmentStatus::Scheduled,
            priority: request.priority,
            parent_appointment_id: request.parent_appointment_id,
            slot_id: request.slot_id,
            availability_id: request.availability_id,
            notes: request.notes,
            diagnosis: None,
            prescription: None,
            vitals: None,
            cancellation_reason: None,
            reschedule_reason: None,
            video_join_url: None,
            video_host_url: None,
            created_at: now,
            updated_at: now,
        };

        let row = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::Storage(e.to_string()))?;
        let appointment_id = appointment.id;
        let slot_id = request.slot_id;
        let availability_id = request.availability_id;

        self.ctx
            .store
            .with_write(|tx| -> Result<(), AppointmentError> {
                // Validate every binding before touching anything.
                let slot = match slot_id {
                    Some(slot_id) => {
                        let slot = decode_slot(
                            tx.get(SLOTS_TABLE, slot_id)
                                .ok_or(AppointmentError::SlotNotFound)?,
                        )?;
                        if slot.is_booked || !slot.is_available {
                            return Err(AppointmentError::SchedulingConflict {
                                start: slot.start_time,
                                end: slot.end_time,
                                conflicting_appointment_id: slot.appointment_id,
                            });
                        }
                        Some(slot)
                    }
                    None => None,
                };
                let bound_window = match availability_id {
                    Some(availability_id) => {
                        let window = decode_availability(
                            tx.get(AVAILABILITY_TABLE, availability_id)
                                .ok_or(AppointmentError::AvailabilityNotFound)?,
                        )?;
                        if window.status != AvailabilityStatus::Available {
                            return Err(AppointmentError::SchedulingConflict {
                                start: window.start_time,
                                end: window.end_time,
                                conflicting_appointment_id: None,
                            });
                        }
                        Some(window)
                    }
                    None => None,
                };

                if let Some(slot) = slot {
                    tx.merge(
                        SLOTS_TABLE,
                        slot.id,
                        json!({
                            "is_booked": true,
                            "is_available": false,
                            "appointment_id": appointment_id,
                            "updated_at": now,
                        }),
                    )?;
                }
                if let Some(window) = bound_window {
                    tx.merge(
                        AVAILABILITY_TABLE,
                        window.id,
                        json!({
                            "status": AvailabilityStatus::Booked,
                            "updated_at": now,
                        }),
                    )?;
                }
                tx.insert(APPOINTMENTS_TABLE, appointment_id, row)?;
                Ok(())
            })
            .await?;

        drop(guard);

        let appointment = self
            .maybe_provision_video(appointment, request.with_video)
            .await;
        self.notifier
            .notify(appointment.id, AppointmentEvent::Created)
            .await;

        info!(
            "Appointment {} booked with provider {}",
            appointment.id, appointment.provider_id
        );
        Ok(appointment)
    }

    /// Update an existing appointment.
    ///
    /// A time change re-runs the conflict check (excluding the appointment
    /// itself); a status change goes through the lifecycle table; moving to
    /// `cancelled` releases any bound slot or availability window in the same
    /// transaction.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {}", appointment_id);

        let current = self.get_appointment(appointment_id).await?;

        let new_start = request.scheduled_start.unwrap_or(current.scheduled_start);
        let new_duration = request.duration_minutes.unwrap_or(current.duration_minutes);
        if new_duration <= 0 {
            return Err(AppointmentError::InvalidTime(
                "duration must be a positive number of minutes".to_string(),
            ));
        }
        let time_changed =
            new_start != current.scheduled_start || new_duration != current.duration_minutes;

        if let Some(new_status) = &request.status {
            self.lifecycle_service
                .validate_status_transition(&current.status, new_status)?;
        }

        let guard = self.ctx.store.provider_lock(current.provider_id).await;

        if time_changed {
            if current.status.is_terminal() {
                return Err(AppointmentError::InvalidStatusTransition(current.status));
            }
            self.conflict_service
                .ensure_free(
                    current.provider_id,
                    TimeRange::from_duration(new_start, new_duration),
                    Some(appointment_id),
                )
                .await?;
        }

        let now = self.ctx.clock.now();
        let mut patch = serde_json::Map::new();
        if let Some(start) = request.scheduled_start {
            patch.insert("scheduled_start".to_string(), json!(start));
            patch.insert("scheduled_time".to_string(), json!(display_time(start)));
        }
        if let Some(duration) = request.duration_minutes {
            patch.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(status) = request.status {
            patch.insert("status".to_string(), json!(status));
        }
        if let Some(reason) = request.reason {
            patch.insert("reason".to_string(), json!(reason));
        }
        if let Some(notes) = request.notes {
            patch.insert("notes".to_string(), json!(notes));
        }
        if let Some(diagnosis) = request.diagnosis {
            patch.insert("diagnosis".to_string(), json!(diagnosis));
        }
        if let Some(prescription) = request.prescription {
            patch.insert("prescription".to_string(), json!(prescription));
        }
        if let Some(vitals) = request.vitals {
            patch.insert("vitals".to_string(), vitals);
        }
        if let Some(cancellation_reason) = request.cancellation_reason {
            patch.insert("cancellation_reason".to_string(), json!(cancellation_reason));
        }
        patch.insert("updated_at".to_string(), json!(now));

        let cancelled = request.status == Some(AppointmentStatus::Cancelled);

        let updated = self
            .ctx
            .store
            .with_write(|tx| -> Result<Value, AppointmentError> {
                let row = tx.merge(APPOINTMENTS_TABLE, appointment_id, Value::Object(patch))?;
                if cancelled {
                    release_bindings(tx, &current, now)?;
                }
                Ok(row)
            })
            .await?;

        drop(guard);

        let updated = decode(updated)?;
        if cancelled {
            self.notifier
                .notify(appointment_id, AppointmentEvent::Cancelled)
                .await;
        }

        info!("Appointment {} updated", appointment_id);
        Ok(updated)
    }

    /// Cancel an appointment, keeping the record for audit.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        let cancellation_note = format!("Cancelled by {:?}: {}", request.cancelled_by, request.reason);

        let update = UpdateAppointmentRequest {
            status: Some(AppointmentStatus::Cancelled),
            cancellation_reason: Some(cancellation_note),
            ..Default::default()
        };

        self.update_appointment(appointment_id, update).await
    }

    /// Move an appointment to a new time by creating a replacement and
    /// retiring the original as `rescheduled`. The replacement references the
    /// original through `parent_appointment_id`; the original's bound slot or
    /// window is released.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Rescheduling appointment {}", appointment_id);

        let current = self.get_appointment(appointment_id).await?;
        self.lifecycle_service
            .validate_status_transition(&current.status, &AppointmentStatus::Rescheduled)?;

        let new_duration = request
            .new_duration_minutes
            .unwrap_or(current.duration_minutes);
        if new_duration <= 0 {
            return Err(AppointmentError::InvalidTime(
                "duration must be a positive number of minutes".to_string(),
            ));
        }

        let window = TimeRange::from_duration(request.new_start_time, new_duration);

        let guard = self.ctx.store.provider_lock(current.provider_id).await;

        self.conflict_service
            .ensure_free(current.provider_id, window, Some(appointment_id))
            .await?;

        let now = self.ctx.clock.now();
        let replacement = Appointment {
            id: Uuid::new_v4(),
            patient_id: current.patient_id,
            provider_id: current.provider_id,
            scheduled_start: request.new_start_time,
            scheduled_time: display_time(request.new_start_time),
            duration_minutes: new_duration,
            reason: current.reason.clone(),
            status: AppointmentStatus::Scheduled,
            priority: current.priority,
            parent_appointment_id: Some(current.id),
            slot_id: None,
            availability_id: None,
            notes: current.notes.clone(),
            diagnosis: None,
            prescription: None,
            vitals: None,
            cancellation_reason: None,
            reschedule_reason: None,
            video_join_url: None,
            video_host_url: None,
            created_at: now,
            updated_at: now,
        };

        let row = serde_json::to_value(&replacement)
            .map_err(|e| AppointmentError::Storage(e.to_string()))?;
        let replacement_id = replacement.id;
        let reason = request.reason;

        self.ctx
            .store
            .with_write(|tx| -> Result<(), AppointmentError> {
                tx.merge(
                    APPOINTMENTS_TABLE,
                    appointment_id,
                    json!({
                        "status": AppointmentStatus::Rescheduled,
                        "reschedule_reason": reason,
                        "updated_at": now,
                    }),
                )?;
                release_bindings(tx, &current, now)?;
                tx.insert(APPOINTMENTS_TABLE, replacement_id, row)?;
                Ok(())
            })
            .await?;

        drop(guard);

        self.notifier
            .notify(appointment_id, AppointmentEvent::Rescheduled)
            .await;

        info!(
            "Appointment {} rescheduled to {} as {}",
            appointment_id, replacement.scheduled_start, replacement.id
        );
        Ok(replacement)
    }

    /// Hard delete. Releases a still-bound slot or window so the binding
    /// invariants survive the delete.
    pub async fn remove_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let current = self.get_appointment(appointment_id).await?;

        let _guard = self.ctx.store.provider_lock(current.provider_id).await;
        let now = self.ctx.clock.now();

        self.ctx
            .store
            .with_write(|tx| -> Result<(), AppointmentError> {
                if !tx.remove(APPOINTMENTS_TABLE, appointment_id) {
                    return Err(AppointmentError::NotFound);
                }
                release_bindings(tx, &current, now)?;
                Ok(())
            })
            .await?;

        debug!("Appointment {} removed", appointment_id);
        Ok(())
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let row = self
            .ctx
            .store
            .get(APPOINTMENTS_TABLE, appointment_id)
            .await
            .ok_or(AppointmentError::NotFound)?;
        decode(row)
    }

    /// Read-only conflict probe for a candidate window.
    pub async fn check_conflicts(
        &self,
        provider_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        self.conflict_service
            .check_conflicts(
                provider_id,
                TimeRange::new(start_time, end_time),
                exclude_appointment_id,
            )
            .await
    }

    async fn maybe_provision_video(
        &self,
        mut appointment: Appointment,
        with_video: bool,
    ) -> Appointment {
        if !with_video {
            return appointment;
        }
        if !self.ctx.config.is_video_configured() {
            debug!(
                "Video requested for appointment {} but provisioner is not configured",
                appointment.id
            );
            return appointment;
        }

        match self.provisioner.provision(appointment.id).await {
            Ok(links) => {
                let patch = json!({
                    "video_join_url": links.join_url,
                    "video_host_url": links.host_url,
                    "updated_at": self.ctx.clock.now(),
                });
                match self
                    .ctx
                    .store
                    .merge(APPOINTMENTS_TABLE, appointment.id, patch)
                    .await
                {
                    Ok(row) => match decode(row) {
                        Ok(enriched) => appointment = enriched,
                        Err(e) => warn!(
                            "Failed to reload appointment {} after video enrichment: {}",
                            appointment.id, e
                        ),
                    },
                    Err(e) => warn!(
                        "Failed to persist video links for appointment {}: {}",
                        appointment.id, e
                    ),
                }
            }
            Err(e) => warn!(
                "Video provisioning failed for appointment {}: {}",
                appointment.id, e
            ),
        }

        appointment
    }

    async fn verify_patient(&self, patient_id: Uuid) -> Result<(), AppointmentError> {
        match self.directory.patient_exists(patient_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppointmentError::PatientNotFound),
            Err(e) => Err(AppointmentError::Directory(e.to_string())),
        }
    }

    async fn verify_provider(&self, provider_id: Uuid) -> Result<(), AppointmentError> {
        match self.directory.provider_exists(provider_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppointmentError::ProviderNotFound),
            Err(e) => Err(AppointmentError::Directory(e.to_string())),
        }
    }
}

/// Release the slot and availability window an appointment consumed.
fn release_bindings(
    tx: &mut Transaction,
    appointment: &Appointment,
    now: DateTime<Utc>,
) -> Result<(), AppointmentError> {
    if let Some(slot_id) = appointment.slot_id {
        if tx.get(SLOTS_TABLE, slot_id).is_some() {
            tx.merge(
                SLOTS_TABLE,
                slot_id,
                json!({
                    "is_booked": false,
                    "is_available": true,
                    "appointment_id": null,
                    "updated_at": now,
                }),
            )?;
        }
    }
    if let Some(availability_id) = appointment.availability_id {
        if tx.get(AVAILABILITY_TABLE, availability_id).is_some() {
            tx.merge(
                AVAILABILITY_TABLE,
                availability_id,
                json!({
                    "status": AvailabilityStatus::Available,
                    "updated_at": now,
                }),
            )?;
        }
    }
    Ok(())
}

fn display_time(start: DateTime<Utc>) -> String {
    start.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn decode_slot(row: Value) -> Result<Slot, AppointmentError> {
    serde_json::from_value(row)
        .map_err(|e| AppointmentError::Storage(format!("failed to parse slot row: {}", e)))
}

fn decode_availability(row: Value) -> Result<Availability, AppointmentError> {
    serde_json::from_value(row)
        .map_err(|e| AppointmentError::Storage(format!("failed to parse availability row: {}", e)))
}
