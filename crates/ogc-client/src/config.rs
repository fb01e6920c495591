//! Configuration document and resolved outbound endpoints.
//!
//! The document is a JSON object shaped like:
//!
//! ```json
//! {
//!   "OGC": { "HOST": "https://ogc.example.org", "TIMEOUT": 30, "AUTH_TOKEN": "..." },
//!   "AUTH_TOKEN": "inbound-secret",
//!   "INTERSERVICE_TIMEOUT": 20,
//!   "HOST": "0.0.0.0",
//!   "PORT": 3001
//! }
//! ```
//!
//! Loading never fails: a missing or unparseable file yields an empty configuration, and every
//! lookup then falls back to its default (or fails closed, for the inbound auth gate).

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_BIND_PORT: u16 = 3001;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Outbound OGC API settings.
    #[serde(rename = "OGC", default)]
    pub ogc: Option<ServiceConfig>,

    /// Expected bearer token for inbound tool calls.
    #[serde(rename = "AUTH_TOKEN", default)]
    pub auth_token: Option<String>,

    /// Fallback timeout (seconds) for outbound services that do not set their own.
    #[serde(rename = "INTERSERVICE_TIMEOUT", default)]
    pub interservice_timeout: Option<f64>,

    #[serde(rename = "HOST", default)]
    pub host: Option<String>,

    #[serde(rename = "PORT", default)]
    pub port: Option<u16>,
}

/// Per-service outbound settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(rename = "HOST", default)]
    pub host: Option<String>,

    /// Per-request timeout in seconds. `0` disables the timeout.
    #[serde(rename = "TIMEOUT", default)]
    pub timeout: Option<f64>,

    /// Bearer token injected into outbound requests.
    #[serde(rename = "AUTH_TOKEN", default)]
    pub auth_token: Option<String>,

    /// Total attempts per operation (1 => no retries).
    #[serde(rename = "MAX_RETRIES", default)]
    pub max_retries: Option<u32>,

    /// Optional overall retry budget in seconds.
    #[serde(rename = "RETRY_BUDGET", default)]
    pub retry_budget: Option<f64>,
}

impl AppConfig {
    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid configuration document.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// The inbound bearer token, trimmed. Blank values count as unset.
    #[must_use]
    pub fn expected_token(&self) -> Option<&str> {
        non_blank(self.auth_token.as_deref())
    }

    #[must_use]
    pub fn bind_host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_BIND_HOST)
    }

    #[must_use]
    pub fn bind_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_BIND_PORT)
    }

    /// Resolve the OGC endpoint from the `OGC` section.
    ///
    /// # Errors
    ///
    /// Returns an error if `OGC.HOST` is missing or invalid, if a timeout is negative or not a
    /// number, or if the outbound token cannot be used as a header value.
    pub fn ogc_endpoint(&self) -> Result<ServiceEndpoint, ConfigError> {
        let service = self.ogc.as_ref().ok_or(ConfigError::Missing("OGC"))?;
        ServiceEndpoint::resolve(service, self.interservice_timeout)
    }
}

/// Resolved, validated settings for one outbound service.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub base_url: Url,
    pub timeout: Option<Duration>,
    pub auth_token: Option<String>,
    pub retry: RetryPolicy,
}

impl ServiceEndpoint {
    /// Build an endpoint with no timeout, token, or retries.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid absolute URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: None,
            auth_token: None,
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn resolve(
        service: &ServiceConfig,
        fallback_timeout: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let host = non_blank(service.host.as_deref()).ok_or(ConfigError::Missing("OGC.HOST"))?;
        let timeout = match service.timeout.or(fallback_timeout) {
            Some(secs) => seconds_to_duration("OGC.TIMEOUT", secs)?,
            None => None,
        };

        let mut retry = RetryPolicy::new(service.max_retries.unwrap_or(1));
        if let Some(secs) = service.retry_budget
            && let Some(budget) = seconds_to_duration("OGC.RETRY_BUDGET", secs)?
        {
            retry = retry.with_overall_timeout(budget);
        }

        Ok(Self {
            base_url: parse_base_url(host)?,
            timeout,
            auth_token: non_blank(service.auth_token.as_deref()).map(str::to_string),
            retry,
        })
    }
}

/// Read and parse the configuration document at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Unreadable`] if the file cannot be read and [`ConfigError::Parse`] if
/// it is not a valid document. A single value of the wrong type (e.g. `"PORT": "3001"`) fails
/// the whole document.
pub fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let bytes = std::fs::read(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    AppConfig::from_slice(&bytes).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Load the configuration document at `path`.
///
/// A missing file or a document that fails to parse yields [`AppConfig::default`]; use
/// [`read_config`] to see why.
#[must_use]
pub fn load_config(path: &Path) -> AppConfig {
    read_config(path).unwrap_or_else(|e| {
        warn!(error = %e, "using empty config");
        AppConfig::default()
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })
}

fn seconds_to_duration(key: &str, secs: f64) -> Result<Option<Duration>, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "{key} must be a non-negative number of seconds (got {secs})"
        )));
    }
    if secs == 0.0 {
        return Ok(None);
    }
    Ok(Some(Duration::from_secs_f64(secs)))
}
