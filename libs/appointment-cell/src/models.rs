// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use directory_cell::{PatientSummary, ProviderSummary};
use shared_utils::time::TimeRange;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// A confirmed booking of a patient against a provider.
///
/// The appointment is the aggregate whose no-overlap invariant the scheduler
/// owns. Clinical fields (`diagnosis`, `prescription`, `vitals`) are stored
/// verbatim and never interpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_time: String,
    pub duration_minutes: i32,
    pub reason: String,
    pub status: AppointmentStatus,
    pub priority: AppointmentPriority,
    pub parent_appointment_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub availability_id: Option<Uuid>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub vitals: Option<Value>,
    pub cancellation_reason: Option<String>,
    pub reschedule_reason: Option<String>,
    pub video_join_url: Option<String>,
    pub video_host_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_start + Duration::minutes(self.duration_minutes as i64)
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::from_duration(self.scheduled_start, self.duration_minutes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::NoShow
                | AppointmentStatus::Rescheduled
        )
    }

    /// Whether this appointment still occupies its interval on the
    /// provider's timeline. Only cancellation frees the time.
    pub fn blocks_timeline(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentPriority {
    #[default]
    Normal,
    Urgent,
    Emergency,
}

impl fmt::Display for AppointmentPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentPriority::Normal => write!(f, "normal"),
            AppointmentPriority::Urgent => write!(f, "urgent"),
            AppointmentPriority::Emergency => write!(f, "emergency"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub duration_minutes: i32,
    pub reason: String,
    #[serde(default)]
    pub priority: AppointmentPriority,
    pub parent_appointment_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub availability_id: Option<Uuid>,
    pub notes: Option<String>,
    #[serde(default)]
    pub with_video: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub scheduled_start: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub status: Option<AppointmentStatus>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub vitals: Option<Value>,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: DateTime<Utc>,
    pub new_duration_minutes: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
    pub cancelled_by: CancelledBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Provider,
    System,
}

// ==============================================================================
// CONFLICT DETECTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<Appointment>,
}

// ==============================================================================
// QUERY PROJECTIONS
// ==============================================================================

/// Read-side projection of an appointment.
///
/// Joined provider/patient records are stripped down to their public
/// summaries on purpose; query responses never expose full profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_time: String,
    pub duration_minutes: i32,
    pub reason: String,
    pub status: AppointmentStatus,
    pub priority: AppointmentPriority,
    pub parent_appointment_id: Option<Uuid>,
    pub provider: ProviderSummary,
    pub patient: PatientSummary,
}

// ==============================================================================
// NOTIFICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEvent {
    Created,
    Cancelled,
    Rescheduled,
}

impl fmt::Display for AppointmentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentEvent::Created => write!(f, "created"),
            AppointmentEvent::Cancelled => write!(f, "cancelled"),
            AppointmentEvent::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Availability window not found")]
    AvailabilityNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Appointment conflicts with an existing booking from {start} to {end}")]
    SchedulingConflict {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        conflicting_appointment_id: Option<Uuid>,
    },

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<shared_store::StoreError> for AppointmentError {
    fn from(e: shared_store::StoreError) -> Self {
        AppointmentError::Storage(e.to_string())
    }
}
