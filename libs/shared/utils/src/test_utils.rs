// libs/shared/utils/src/test_utils.rs
//
// Fixture builders shared by the cell test suites.

use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;

/// Config pointing every collaborator at the given base URLs. Empty strings
/// leave the corresponding integration disabled, matching production
/// behavior for unset environment variables.
pub fn test_config(directory_url: &str, notification_url: &str, video_url: &str) -> AppConfig {
    AppConfig {
        port: 0,
        directory_url: directory_url.to_string(),
        notification_webhook_url: notification_url.to_string(),
        video_meeting_api_url: video_url.to_string(),
    }
}

/// Directory row for a provider, in the shape the directory service returns.
pub fn provider_row(id: Uuid, full_name: &str, specialty: &str) -> Value {
    json!({
        "id": id,
        "full_name": full_name,
        "specialty": specialty
    })
}

/// Directory row for a patient.
pub fn patient_row(id: Uuid, full_name: &str, date_of_birth: &str) -> Value {
    json!({
        "id": id,
        "full_name": full_name,
        "date_of_birth": date_of_birth
    })
}
