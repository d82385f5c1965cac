use std::{env, str::FromStr, time::Duration};

use clap::ValueEnum;

use crate::{error::VhsError, retry::RetryPolicy};

pub const API_URL_VAR: &str = "VHS_API_URL";
pub const API_VERSION_VAR: &str = "VHS_API_VERSION";
pub const REQUEST_TIMEOUT_VAR: &str = "VHS_REQUEST_TIMEOUT_MS";
pub const RETRY_ATTEMPTS_VAR: &str = "VHS_RETRY_ATTEMPTS";
pub const RETRY_DELAY_VAR: &str = "VHS_RETRY_DELAY_MS";
pub const ENABLE_LOGGING_VAR: &str = "VHS_ENABLE_LOGGING";

/// Deployment profile, only used to pick defaults. The backend host is never
/// part of a profile and must always be provided.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    Development,
    #[default]
    Production,
}

/// Everything the client needs to know about the backend it talks to.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Origin of the backend, without trailing slash.
    pub api_url: String,
    pub api_version: String,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Emits request and response details. Has no effect on behavior.
    pub enable_logging: bool,
}

impl ClientConfig {
    /// Configuration for `api_url` with the defaults of `profile`.
    pub fn new(api_url: &str, profile: Profile) -> Result<Self, VhsError> {
        let (retry_attempts, retry_delay, enable_logging) = match profile {
            Profile::Development => (3, Duration::from_millis(2000), true),
            Profile::Production => (2, Duration::from_millis(3000), false),
        };
        Ok(ClientConfig {
            api_url: normalize_api_url(api_url)?,
            api_version: "v1".to_string(),
            request_timeout: Duration::from_millis(120_000),
            retry_attempts,
            retry_delay,
            enable_logging,
        })
    }

    /// Reads the configuration from the `VHS_*` environment variables.
    /// `VHS_API_URL` is mandatory, the others override the profile defaults.
    pub fn from_env(profile: Profile) -> Result<Self, VhsError> {
        ClientConfig::from_env_with_url(None, profile)
    }

    /// Same as [ClientConfig::from_env], `api_url` taking precedence over
    /// `VHS_API_URL` when given.
    pub fn from_env_with_url(api_url: Option<&str>, profile: Profile) -> Result<Self, VhsError> {
        let api_url = match api_url {
            Some(url) => url.to_string(),
            None => env::var(API_URL_VAR)
                .map_err(|_| VhsError::Config(format!("{} is not set", API_URL_VAR)))?,
        };
        let mut config = ClientConfig::new(&api_url, profile)?;

        if let Ok(version) = env::var(API_VERSION_VAR) {
            config.api_version = version.trim_matches('/').to_string();
        }
        if let Some(ms) = parse_var::<u64>(REQUEST_TIMEOUT_VAR)? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var::<u32>(RETRY_ATTEMPTS_VAR)? {
            config.retry_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64>(RETRY_DELAY_VAR)? {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(enabled) = parse_var::<bool>(ENABLE_LOGGING_VAR)? {
            config.enable_logging = enabled;
        }
        Ok(config)
    }

    pub fn analyze_url(&self) -> String {
        format!("{}/{}/vhs/analyze", self.api_url, self.api_version)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.api_url)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_delay)
    }
}

fn normalize_api_url(api_url: &str) -> Result<String, VhsError> {
    let trimmed = api_url.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| VhsError::Config(format!("invalid API URL {}: {}", api_url, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        scheme => Err(VhsError::Config(format!(
            "unsupported scheme {} in API URL {}",
            scheme, api_url
        ))),
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, VhsError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| VhsError::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(None),
    }
}
