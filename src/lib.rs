//! # vhs_client
//! ## Before you begin
//! This library talks to a VHS analyzer backend, an inference service measuring the Vertebral Heart
//! Score of canine and feline chest radiographs. The backend is not bundled: its origin must be provided,
//! either through the `VHS_API_URL` environment variable or explicitly. More details in the
//! [ClientConfig] documentation.
//!
//! ## Description
//! **vhs_client** submits a JPEG or PNG radiograph to the backend and returns the measurements it
//! computed: the VHS score and the long and short heart axes in vertebral units, a clinical
//! classification with severity and confidence, the detected keypoints, and optionally an annotated
//! overlay image.
//!
//! A typical interaction goes through three steps:
//!
//! 1. Check the file locally with [validate()], which lists every problem at once.
//! 2. Submit it with [VhsClient::analyze], which retries rate limited (429) and unavailable (503)
//!    answers with a linear backoff, under an overall timeout.
//! 3. Render or save the [AnalysisResult], see [summary()] and [save_results()].
//!
//! Every failure displays as a single message meant for the end user, see [VhsError] and
//! [normalize_message()].
//!
//! All requests in flight are counted by a [BusyFlag], shared by the caller, which can drive a
//! progress indicator through [BusyFlag::subscribe].
//!
//! ## Example
//! ```rust no_run
//! use std::sync::Arc;
//!
//! use vhs_client::{AnalysisOptions, BusyFlag, ClientConfig, ImageFile, Profile, VhsClient};
//!
//! #[tokio::main]
//! pub async fn main() {
//!     let config = ClientConfig::from_env(Profile::Production).unwrap();
//!     let client = VhsClient::new(config, Arc::new(BusyFlag::new())).unwrap();
//!
//!     let file = ImageFile::open("thorax_lateral.jpg").await.unwrap();
//!     let validation = client.validate(&file);
//!     if !validation.valid {
//!         panic!("Invalid file: {:?}", validation.errors);
//!     }
//!
//!     match client.analyze(Some(&file), &AnalysisOptions::default()).await {
//!         Ok(result) => println!("{}", vhs_client::summary(&result)),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```

mod busy;
mod client;
mod config;
mod error;
mod get;
mod logging;
mod post;
mod preview;
mod report;
mod retry;
mod structs;
mod validate;

pub use busy::{BusyFlag, BusyGuard};
pub use client::VhsClient;
pub use config::{ClientConfig, Profile};
pub use error::{messages, normalize_message, VhsError};
pub use get::HEALTH_TIMEOUT;
pub use logging::{env_filter, init_tracing, LogLevel};
pub use post::FILE_FIELD;
pub use preview::{create_preview, create_preview_from_path, decode_data_url, to_data_url};
pub use report::{
    export_json, format_file_size, format_processing_time, result_stems, save_results, summary,
};
pub use retry::{RetryPolicy, RetryState};
pub use structs::{
    content_type_for, AnalysisOptions, AnalysisResult, Classification, ClinicalClassification,
    Confidence, ErrorResponse, HealthResponse, ImageFile, Keypoint, Measurements, Severity,
};
pub use validate::{validate, ValidationOutcome, ALLOWED_TYPES, MAX_FILE_SIZE};
