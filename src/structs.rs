use std::{collections::HashMap, fmt, path::Path, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::VhsError;

/// An image picked by the user, with the MIME type it declares.
///
/// The payload is held as [Bytes] so that every retry of a request can resend
/// it without copying.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    pub data: Bytes,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        ImageFile {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    /// Reads an image from disk. The MIME type is derived from the extension.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, VhsError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(ImageFile::new(name, content_type_for(path), data))
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Guesses the content type of an image from its file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Options for a single call to [crate::VhsClient::analyze].
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisOptions {
    /// Ask the backend for the annotated overlay image.
    pub include_overlay: bool,
    /// Overrides the configured request timeout for this call.
    pub timeout: Option<Duration>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            include_overlay: true,
            timeout: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Normal,
    Borderline,
    Cardiomegaly,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Severe,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Normal => "Normal",
            Classification::Borderline => "Borderline",
            Classification::Cardiomegaly => "Cardiomegaly",
        })
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::None => "None",
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
        })
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        })
    }
}

/// A detected landmark, in pixel coordinates of the submitted image.
/// Serialized as a `[x, y]` pair.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint(pub f64, pub f64);

impl Keypoint {
    pub fn x(&self) -> f64 {
        self.0
    }

    pub fn y(&self) -> f64 {
        self.1
    }
}

/// Heart measurements in vertebral units. The backend guarantees
/// `vhs_score == long_axis + short_axis`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub vhs_score: f64,
    pub long_axis: f64,
    pub short_axis: f64,
    pub long_axis_vertebrae: f64,
    pub short_axis_vertebrae: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicalClassification {
    pub classification: Classification,
    pub severity: Severity,
    pub confidence: Confidence,
    pub recommendation: String,
    #[serde(default)]
    pub clinical_notes: Vec<String>,
}

/// Successful response of the analyze endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub keypoints: Vec<Keypoint>,
    #[serde(rename = "vhs_measurements")]
    pub measurements: Measurements,
    #[serde(rename = "clinical_classification")]
    pub classification: ClinicalClassification,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Base64 encoded PNG, only present when it was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_image: Option<String>,
    pub processing_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Decodes the overlay image, if the backend sent one.
    pub fn overlay_bytes(&self) -> Result<Option<Vec<u8>>, VhsError> {
        let Some(overlay) = self.overlay_image.as_deref() else {
            return Ok(None);
        };
        // Some deployments send a full data URL instead of the bare payload.
        let payload = match overlay.split_once(";base64,") {
            Some((prefix, payload)) if prefix.starts_with("data:") => payload,
            _ => overlay,
        };
        STANDARD
            .decode(payload.trim())
            .map(Some)
            .map_err(|e| VhsError::Other(format!("invalid overlay image: {}", e)))
    }

    pub fn model_version(&self) -> Option<&str> {
        self.metadata.get("model_version").and_then(|v| v.as_str())
    }
}

/// The two fields every analyze response carries, decoded before the rest so
/// that `success: false` bodies need not be complete.
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Error body sent by the backend along with a non-success status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

impl ErrorResponse {
    /// Reads any JSON body field by field. A field of an unexpected type is
    /// dropped without losing the others, so the `error` text survives.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        let field = |name: &str| value.get(name).filter(|v| !v.is_null());

        Some(ErrorResponse {
            success: field("success")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
            error: field("error")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            details: field("details").cloned(),
            status_code: field("status_code")
                .and_then(serde_json::Value::as_u64)
                .and_then(|code| u16::try_from(code).ok()),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[cfg(test)]
pub(crate) const SAMPLE_RESPONSE: &str = r#"{
    "success": true,
    "keypoints": [[120.5, 88.0], [310.0, 402.25], [150, 200]],
    "vhs_measurements": {
        "vhs_score": 10.4,
        "long_axis": 5.8,
        "short_axis": 4.6,
        "long_axis_vertebrae": 6,
        "short_axis_vertebrae": 5
    },
    "clinical_classification": {
        "classification": "borderline",
        "severity": "mild",
        "confidence": "high",
        "recommendation": "Follow-up radiograph in 6 months",
        "clinical_notes": ["Slight enlargement of the left atrium"]
    },
    "metadata": {"model_version": "hrnet-1.2", "image_size": [512, 512]},
    "overlay_image": "iVBORw0KGgo=",
    "processing_time_ms": 842.7
}"#;
