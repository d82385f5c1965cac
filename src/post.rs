use std::time::Instant;

use reqwest::multipart;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    busy::BusyGuard,
    error::VhsError,
    structs::{AnalysisOptions, AnalysisResult, ErrorResponse, ImageFile, ResponseEnvelope},
    VhsClient,
};

/// Multipart field the backend reads the radiograph from.
pub const FILE_FIELD: &str = "file";

impl VhsClient {
    /// Submits a radiograph for analysis.
    ///
    /// The whole exchange, retries of 429 and 503 answers included, must
    /// complete within `options.timeout` or the configured request timeout.
    /// A response that arrives with `success: false` is reported as a failure
    /// carrying the backend's message.
    ///
    /// # Errors
    ///
    /// * [VhsError::NoFile] right away when `file` is `None`, without any
    ///   request being sent.
    /// * [VhsError::Timeout] when the time limit is exceeded.
    /// * Otherwise the error whose message describes the last failure.
    pub async fn analyze(
        &self,
        file: Option<&ImageFile>,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult, VhsError> {
        let file = file.ok_or(VhsError::NoFile)?;

        let request_id = Uuid::new_v4();
        let _busy = BusyGuard::new(self.busy.clone());

        let url = self.config.analyze_url();
        let limit = options.timeout.unwrap_or(self.config.request_timeout);
        let policy = self.config.retry_policy();

        let start = Instant::now();

        let outcome = tokio::time::timeout(
            limit,
            policy.run(|attempt| {
                self.post_once(&url, file, options.include_overlay, request_id, attempt)
            }),
        )
        .await
        .unwrap_or(Err(VhsError::Timeout));

        match &outcome {
            Ok(result) => info!(
                "Radiograph {} analyzed in {:?}, VHS {:.2}",
                file.name,
                start.elapsed(),
                result.measurements.vhs_score
            ),
            Err(e) => {
                if self.config.enable_logging {
                    debug!(
                        request_id = %request_id,
                        status = ?e.status(),
                        elapsed = ?start.elapsed(),
                        "Analysis of {} failed: {:?}",
                        file.name,
                        e
                    );
                }
                error!("Error while analyzing {}: {}", file.name, e);
            }
        }

        outcome
    }

    /// Sends one analyze request and interprets its response. Each call
    /// rebuilds an identical form from the same payload.
    async fn post_once(
        &self,
        url: &str,
        file: &ImageFile,
        include_overlay: bool,
        request_id: Uuid,
        attempt: u32,
    ) -> Result<AnalysisResult, VhsError> {
        let form = build_form(file)?;

        let start = Instant::now();

        let response = self
            .http
            .post(url)
            .query(&[("includeOverlay", include_overlay)])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if self.config.enable_logging {
            debug!(
                request_id = %request_id,
                attempt,
                status = status.as_u16(),
                bytes = body.len(),
                "[HTTP] POST {} in {:?}",
                url,
                start.elapsed()
            );
        }

        if !status.is_success() {
            let error_body = ErrorResponse::from_body(&body);
            return Err(VhsError::from_status(status.as_u16(), error_body.as_ref()));
        }

        parse_analysis(&body)
    }
}

/// Builds the multipart form carrying the radiograph under [FILE_FIELD].
fn build_form(file: &ImageFile) -> Result<multipart::Form, VhsError> {
    let part = multipart::Part::stream_with_length(file.data.clone(), file.len())
        .file_name(file.name.clone())
        .mime_str(&file.mime)
        .map_err(|_| VhsError::Other(format!("invalid content type {}", file.mime)))?;
    Ok(multipart::Form::new().part(FILE_FIELD, part))
}

/// Decodes a 2xx body. The envelope is read first so that a `success: false`
/// answer surfaces its message even when the rest of the body is missing.
pub(crate) fn parse_analysis(body: &[u8]) -> Result<AnalysisResult, VhsError> {
    let envelope: ResponseEnvelope = serde_json::from_slice(body)
        .map_err(|e| VhsError::Other(format!("invalid response from the backend: {}", e)))?;

    if !envelope.success {
        return Err(VhsError::analysis(envelope.error.as_deref()));
    }

    serde_json::from_slice(body)
        .map_err(|e| VhsError::Other(format!("invalid response from the backend: {}", e)))
}
