use thiserror::Error;

use crate::structs::ErrorResponse;

/// User facing messages. Every failure surfaced by the client displays as
/// exactly one of these, or as a message provided by the backend.
pub mod messages {
    pub const NO_FILE: &str = "No file selected";
    pub const INVALID_TYPE: &str = "The backend rejected the file: invalid format";
    pub const FILE_TOO_LARGE: &str = "File larger than 10MB";
    pub const RATE_LIMIT: &str = "Rate limit exceeded (429), try again in a few seconds";
    pub const SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable (503)";
    pub const NETWORK_ERROR: &str = "Unexpected error, check your connection";
    pub const TIMEOUT: &str = "The analysis took too long";
    pub const INTERNAL_ERROR: &str = "Internal server error";
    pub const ANALYSIS_FAILED: &str = "Analysis failed";
    pub const UNKNOWN: &str = "Unknown error while processing the radiograph";
}

#[derive(Debug, Error)]
pub enum VhsError {
    #[error("{}", messages::NO_FILE)]
    NoFile,
    #[error("{}", messages::NETWORK_ERROR)]
    Network(#[source] reqwest::Error),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("{}", messages::TIMEOUT)]
    Timeout,
    /// The transport succeeded but the backend reported `success: false`.
    #[error("{0}")]
    Analysis(String),
    #[error("{0}")]
    Preview(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{}", failure_message(.0))]
    Other(String),
}

impl VhsError {
    /// Builds the error for a non-success HTTP status, using the decoded
    /// backend error body when there is one.
    pub fn from_status(status: u16, body: Option<&ErrorResponse>) -> Self {
        VhsError::Status {
            status,
            message: normalize_message(Some(status), body, None),
        }
    }

    /// Application level failure, for a `success: false` body.
    pub fn analysis(error: Option<&str>) -> Self {
        let message = error
            .filter(|m| !m.is_empty())
            .unwrap_or(messages::ANALYSIS_FAILED);
        VhsError::Analysis(message.to_string())
    }

    /// Only rate limiting and service unavailability are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VhsError::Status { status: 429 | 503, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            VhsError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for VhsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            VhsError::Timeout
        } else if let Some(status) = e.status() {
            VhsError::from_status(status.as_u16(), None)
        } else if e.is_connect() || e.is_request() {
            VhsError::Network(e)
        } else {
            VhsError::Other(e.to_string())
        }
    }
}

/// Maps a failed outcome to the message shown to the user.
///
/// `status` is the HTTP status when the backend answered (`0` stands for an
/// unreachable backend), `body` the decoded error body if any, and `failure`
/// the message of a failure that carries no status at all.
pub fn normalize_message(
    status: Option<u16>,
    body: Option<&ErrorResponse>,
    failure: Option<&str>,
) -> String {
    let backend = body
        .and_then(|b| b.error.as_deref())
        .filter(|m| !m.is_empty());

    match status {
        Some(0) => messages::NETWORK_ERROR.to_string(),
        Some(400) => backend.unwrap_or(messages::INVALID_TYPE).to_string(),
        Some(413) => messages::FILE_TOO_LARGE.to_string(),
        Some(429) => messages::RATE_LIMIT.to_string(),
        Some(503) => messages::SERVICE_UNAVAILABLE.to_string(),
        Some(500 | 502 | 504) => backend.unwrap_or(messages::INTERNAL_ERROR).to_string(),
        Some(other) => match backend {
            Some(m) => m.to_string(),
            None => match reason_phrase(other) {
                Some(reason) => format!("Error {}: {}", other, reason),
                None => format!("Error {}", other),
            },
        },
        None => failure
            .filter(|m| !m.is_empty())
            .unwrap_or(messages::UNKNOWN)
            .to_string(),
    }
}

fn failure_message(failure: &str) -> String {
    normalize_message(None, None, Some(failure))
}

fn reason_phrase(status: u16) -> Option<&'static str> {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(error: &str) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: Some(error.to_string()),
            details: None,
            status_code: None,
        }
    }

    #[test]
    fn test_backend_message_survives_structured_details() {
        let b = ErrorResponse::from_body(
            br#"{"success": false, "error": "Image must be a lateral thorax view", "details": {"field": "file"}}"#,
        );
        assert_eq!(
            normalize_message(Some(400), b.as_ref(), None),
            "Image must be a lateral thorax view"
        );
    }

    #[test]
    fn test_fixed_messages_ignore_backend_body() {
        let b = body("backend says no");
        assert_eq!(normalize_message(Some(0), Some(&b), None), messages::NETWORK_ERROR);
        assert_eq!(normalize_message(Some(413), Some(&b), None), messages::FILE_TOO_LARGE);
        assert_eq!(normalize_message(Some(429), Some(&b), None), messages::RATE_LIMIT);
        assert_eq!(
            normalize_message(Some(503), Some(&b), None),
            messages::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_bad_request_prefers_backend_message() {
        let b = body("Image must be a chest radiograph");
        assert_eq!(
            normalize_message(Some(400), Some(&b), None),
            "Image must be a chest radiograph"
        );
        assert_eq!(normalize_message(Some(400), None, None), messages::INVALID_TYPE);
        assert_eq!(
            normalize_message(Some(400), Some(&body("")), None),
            messages::INVALID_TYPE
        );
    }

    #[test]
    fn test_server_errors() {
        for status in [500, 502, 504] {
            assert_eq!(
                normalize_message(Some(status), None, None),
                messages::INTERNAL_ERROR
            );
        }
        assert_eq!(
            normalize_message(Some(502), Some(&body("model not loaded")), None),
            "model not loaded"
        );
    }

    #[test]
    fn test_other_status_falls_back_to_reason_phrase() {
        assert_eq!(normalize_message(Some(404), None, None), "Error 404: Not Found");
        assert_eq!(normalize_message(Some(599), None, None), "Error 599");
        assert_eq!(
            normalize_message(Some(401), Some(&body("bad token")), None),
            "bad token"
        );
    }

    #[test]
    fn test_statusless_failures() {
        assert_eq!(normalize_message(None, None, Some("disk full")), "disk full");
        assert_eq!(normalize_message(None, None, Some("")), messages::UNKNOWN);
        assert_eq!(normalize_message(None, None, None), messages::UNKNOWN);
        assert_eq!(VhsError::Other(String::new()).to_string(), messages::UNKNOWN);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(VhsError::from_status(429, None).is_retryable());
        assert!(VhsError::from_status(503, None).is_retryable());
        assert!(!VhsError::from_status(500, None).is_retryable());
        assert!(!VhsError::from_status(400, None).is_retryable());
        assert!(!VhsError::Timeout.is_retryable());
        assert!(!VhsError::NoFile.is_retryable());
    }

    #[test]
    fn test_analysis_failure_fallback() {
        assert_eq!(VhsError::analysis(Some("X")).to_string(), "X");
        assert_eq!(VhsError::analysis(None).to_string(), messages::ANALYSIS_FAILED);
        assert_eq!(VhsError::analysis(Some("")).to_string(), messages::ANALYSIS_FAILED);
    }
}
