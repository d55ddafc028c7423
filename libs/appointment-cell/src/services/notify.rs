// libs/appointment-cell/src/services/notify.rs
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_store::AppContext;

use crate::models::AppointmentEvent;

/// Fire-and-forget delivery to the notification webhook.
///
/// Notification failures never affect a scheduling outcome: the booking
/// transaction has already committed by the time this runs, so the only
/// thing to do with an error is log it.
pub struct NotificationClient {
    ctx: Arc<AppContext>,
}

impl NotificationClient {
    pub fn new(ctx: &Arc<AppContext>) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub async fn notify(&self, appointment_id: Uuid, event: AppointmentEvent) {
        if !self.ctx.config.is_notification_configured() {
            debug!(
                "Notifications disabled, skipping {} event for appointment {}",
                event, appointment_id
            );
            return;
        }

        let payload = json!({
            "appointment_id": appointment_id,
            "event": event,
        });

        let result = self
            .ctx
            .http
            .post(&self.ctx.config.notification_webhook_url)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(
                    "Notification {} delivered for appointment {}",
                    event, appointment_id
                );
            }
            Ok(response) => {
                warn!(
                    "Notification endpoint returned {} for appointment {}",
                    response.status(),
                    appointment_id
                );
            }
            Err(e) => {
                warn!(
                    "Notification delivery failed for appointment {}: {}",
                    appointment_id, e
                );
            }
        }
    }
}
