use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub directory_url: String,
    pub notification_webhook_url: String,
    pub video_meeting_api_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            directory_url: env::var("DIRECTORY_URL")
                .unwrap_or_else(|_| {
                    warn!("DIRECTORY_URL not set, using empty value");
                    String::new()
                }),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .unwrap_or_else(|_| {
                    warn!("NOTIFICATION_WEBHOOK_URL not set, notifications disabled");
                    String::new()
                }),
            video_meeting_api_url: env::var("VIDEO_MEETING_API_URL")
                .unwrap_or_else(|_| {
                    warn!("VIDEO_MEETING_API_URL not set, video enrichment disabled");
                    String::new()
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.directory_url.is_empty()
    }

    pub fn is_notification_configured(&self) -> bool {
        !self.notification_webhook_url.is_empty()
    }

    pub fn is_video_configured(&self) -> bool {
        !self.video_meeting_api_url.is_empty()
    }
}
