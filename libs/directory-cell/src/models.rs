// libs/directory-cell/src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimal public projection of a provider record.
///
/// This is all of the provider profile the scheduler is allowed to expose;
/// query responses embed this instead of the full directory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
}

/// Minimal public projection of a patient record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: Uuid,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}
