// libs/appointment-cell/src/services/telemedicine.rs
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_store::AppContext;

use crate::models::AppointmentError;

#[derive(Debug, Clone, Deserialize)]
pub struct MeetingLinks {
    pub join_url: String,
    pub host_url: String,
}

/// Client for the external video-meeting provisioner.
///
/// Provisioning is best-effort enrichment after booking; the caller decides
/// what a failure means (in practice: log and move on).
pub struct MeetingProvisioner {
    ctx: Arc<AppContext>,
}

impl MeetingProvisioner {
    pub fn new(ctx: &Arc<AppContext>) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub async fn provision(&self, appointment_id: Uuid) -> Result<MeetingLinks, AppointmentError> {
        let url = format!("{}/sessions", self.ctx.config.video_meeting_api_url);
        debug!(
            "Provisioning video session for appointment {} via {}",
            appointment_id, url
        );

        let response = self
            .ctx
            .http
            .post(&url)
            .json(&json!({ "appointment_id": appointment_id }))
            .send()
            .await
            .map_err(|e| AppointmentError::ExternalService(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppointmentError::ExternalService(format!(
                "video provisioner returned {}",
                status
            )));
        }

        response
            .json::<MeetingLinks>()
            .await
            .map_err(|e| AppointmentError::ExternalService(e.to_string()))
    }
}
