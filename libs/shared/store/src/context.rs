// libs/shared/store/src/context.rs
use std::sync::Arc;

use shared_config::AppConfig;
use shared_utils::clock::{Clock, SystemClock};

use crate::memory::MemoryStore;

/// Shared application state handed to every cell router.
///
/// Services are constructed per request from this context; the store, the
/// clock, and the outbound HTTP client are the long-lived pieces.
pub struct AppContext {
    pub config: AppConfig,
    pub store: MemoryStore,
    pub clock: Arc<dyn Clock>,
    pub http: reqwest::Client,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store: MemoryStore::new(),
            clock,
            http: reqwest::Client::new(),
        }
    }
}
