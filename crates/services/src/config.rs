use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigLoadError;
use crate::grading::PollPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const BASE_URL_VAR: &str = "EXAM_API_BASE_URL";
pub const API_KEY_VAR: &str = "EXAM_API_KEY";
pub const POLL_INTERVAL_VAR: &str = "EXAM_POLL_INTERVAL_MS";
pub const POLL_ATTEMPTS_VAR: &str = "EXAM_POLL_MAX_ATTEMPTS";
pub const TIMEOUT_VAR: &str = "EXAM_HTTP_TIMEOUT_SECS";

/// Where the generation and grading services live and how patiently to talk to them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub poll: PollPolicy,
}

impl ServiceConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll: PollPolicy::default(),
        }
    }

    /// Read configuration from `EXAM_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigLoadError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`ServiceConfig::from_env`] with a custom variable source.
    ///
    /// Unset and blank variables fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigLoadError` if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let base_url = match read(BASE_URL_VAR) {
            Some(raw) => parse_base_url(BASE_URL_VAR, &raw)?,
            None => parse_base_url(BASE_URL_VAR, DEFAULT_BASE_URL)?,
        };
        let mut config = Self::new(base_url);
        config.api_key = read(API_KEY_VAR).map(|key| key.trim().to_string());

        if let Some(raw) = read(TIMEOUT_VAR) {
            config.request_timeout = Duration::from_secs(parse_positive(TIMEOUT_VAR, &raw)?);
        }
        if let Some(raw) = read(POLL_INTERVAL_VAR) {
            config.poll.interval = Duration::from_millis(parse_positive(POLL_INTERVAL_VAR, &raw)?);
        }
        if let Some(raw) = read(POLL_ATTEMPTS_VAR) {
            let attempts = parse_positive(POLL_ATTEMPTS_VAR, &raw)?;
            config.poll.max_attempts =
                u32::try_from(attempts).map_err(|_| ConfigLoadError::InvalidNumber {
                    var: POLL_ATTEMPTS_VAR,
                    raw: raw.clone(),
                })?;
        }
        Ok(config)
    }
}

/// Parse an http(s) base URL.
///
/// # Errors
///
/// Returns `ConfigLoadError` if `raw` is not an absolute http or https URL.
pub fn parse_base_url(var: &'static str, raw: &str) -> Result<Url, ConfigLoadError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigLoadError::InvalidUrl { var, source })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigLoadError::UnsupportedScheme {
            var,
            raw: raw.to_string(),
        }),
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigLoadError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigLoadError::InvalidNumber {
            var,
            raw: raw.to_string(),
        }),
    }
}
