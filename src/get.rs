use std::time::{Duration, Instant};

use tracing::debug;

use crate::{
    busy::BusyGuard,
    error::VhsError,
    structs::{ErrorResponse, HealthResponse},
    VhsClient,
};

/// The health endpoint must answer quickly, whatever the configured request
/// timeout is.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

impl VhsClient {
    /// Asks the backend whether it is up. Never retried.
    pub async fn check_health(&self) -> Result<HealthResponse, VhsError> {
        let _busy = BusyGuard::new(self.busy.clone());
        let url = self.config.health_url();

        tokio::time::timeout(HEALTH_TIMEOUT, self.get_health(&url))
            .await
            .unwrap_or(Err(VhsError::Timeout))
    }

    async fn get_health(&self, url: &str) -> Result<HealthResponse, VhsError> {
        let start = Instant::now();

        let response = self.http.get(url).send().await?;
        let status = response.status();

        if self.config.enable_logging {
            debug!("[HTTP] GET {} {} in {:?}", url, status, start.elapsed());
        }

        if !status.is_success() {
            let body = response.bytes().await?;
            let error_body = ErrorResponse::from_body(&body);
            return Err(VhsError::from_status(status.as_u16(), error_body.as_ref()));
        }

        Ok(response.json::<HealthResponse>().await?)
    }
}
