// libs/directory-cell/src/client.rs
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_store::AppContext;

use crate::models::{DirectoryError, PatientSummary, ProviderSummary};

/// Client for the external provider/patient directory.
///
/// The directory owns identity; the scheduler only validates references and
/// pulls the minimized summaries embedded in query responses.
pub struct DirectoryClient {
    ctx: Arc<AppContext>,
}

impl DirectoryClient {
    pub fn new(ctx: &Arc<AppContext>) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub async fn provider_exists(&self, provider_id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.fetch_one("providers", provider_id).await?.is_some())
    }

    pub async fn get_provider_summary(
        &self,
        provider_id: Uuid,
    ) -> Result<ProviderSummary, DirectoryError> {
        let row = self
            .fetch_one("providers", provider_id)
            .await?
            .ok_or(DirectoryError::ProviderNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| DirectoryError::Unavailable(format!("bad provider record: {}", e)))
    }

    pub async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.fetch_one("patients", patient_id).await?.is_some())
    }

    pub async fn get_patient_summary(
        &self,
        patient_id: Uuid,
    ) -> Result<PatientSummary, DirectoryError> {
        let row = self
            .fetch_one("patients", patient_id)
            .await?
            .ok_or(DirectoryError::PatientNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| DirectoryError::Unavailable(format!("bad patient record: {}", e)))
    }

    async fn fetch_one(
        &self,
        resource: &str,
        id: Uuid,
    ) -> Result<Option<Value>, DirectoryError> {
        let url = format!("{}/{}?id=eq.{}", self.ctx.config.directory_url, resource, id);
        debug!("Directory lookup: {}", url);

        let response = self
            .ctx
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "directory returned {}",
                status
            )));
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().next())
    }
}
