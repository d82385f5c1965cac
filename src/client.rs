use std::sync::Arc;

use reqwest::{header, Client};

use crate::{
    busy::BusyFlag,
    config::ClientConfig,
    error::VhsError,
    preview,
    structs::ImageFile,
    validate::{self, ValidationOutcome},
};

/// Client of the VHS analyzer backend.
///
/// Every HTTP call it issues is counted in the shared [BusyFlag] for as long
/// as it is in flight. The client is cheap to share behind an [Arc] and
/// concurrent calls are independent of each other.
#[derive(Debug)]
pub struct VhsClient {
    pub(crate) http: Client,
    pub(crate) config: ClientConfig,
    pub(crate) busy: Arc<BusyFlag>,
}

impl VhsClient {
    pub fn new(config: ClientConfig, busy: Arc<BusyFlag>) -> Result<Self, VhsError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder().default_headers(headers).build()?;

        Ok(VhsClient { http, config, busy })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn busy(&self) -> &Arc<BusyFlag> {
        &self.busy
    }

    /// See [validate::validate].
    pub fn validate(&self, file: &ImageFile) -> ValidationOutcome {
        validate::validate(file)
    }

    /// See [preview::create_preview].
    pub async fn create_preview(&self, file: &ImageFile) -> Result<String, VhsError> {
        preview::create_preview(file).await
    }
}
