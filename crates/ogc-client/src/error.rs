//! Error types for `ogc-mcp-client`.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Maximum number of characters kept from an error message.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// The single error type crossing the domain-operation boundary.
///
/// Upstream HTTP failures, transport failures and inbound auth rejections are all expressed as
/// an `ApiError` carrying an HTTP-style status code. The retry orchestrator inspects
/// [`ApiError::status_code`] to decide whether another attempt is allowed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (status {status_code})")]
pub struct ApiError {
    message: String,
    status_code: u16,
    meta: Option<Value>,
    quiet: bool,
    error_id: Option<i64>,
    error_code: Option<i64>,
    code: Option<Value>,
}

impl ApiError {
    /// Build an error with the default status (400 Bad Request).
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: truncate_message(message.into()),
            status_code: StatusCode::BAD_REQUEST.as_u16(),
            meta: None,
            quiet: true,
            error_id: None,
            error_code: None,
            code: None,
        }
    }

    #[must_use]
    pub fn with_status(message: impl Into<String>, status: StatusCode) -> Self {
        Self::new(message).status(status.as_u16())
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_status(message, StatusCode::UNAUTHORIZED)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_status(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Override the status code. Non-HTTP values are kept as-is.
    #[must_use]
    pub fn status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    #[must_use]
    pub fn with_error_id(mut self, error_id: i64) -> Self {
        self.error_id = Some(error_id);
        self
    }

    #[must_use]
    pub fn with_error_code(mut self, error_code: i64) -> Self {
        self.error_code = Some(error_code);
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: Value) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    #[must_use]
    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    /// Whether the error is expected noise that callers may log at a low level.
    #[must_use]
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    #[must_use]
    pub fn error_id(&self) -> Option<i64> {
        self.error_id
    }

    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        self.error_code
    }

    #[must_use]
    pub fn code(&self) -> Option<&Value> {
        self.code.as_ref()
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code >= 500
    }
}

fn truncate_message(message: String) -> String {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message,
    }
}

/// Failure of the transport itself (connect refused, socket timeout, body read error).
///
/// The HTTP call primitive returns this untouched; the layer invoking it converts it into an
/// [`ApiError`] so the retry policy applies uniformly.
#[derive(Debug, Clone, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    message: String,
    timed_out: bool,
}

impl TransportError {
    #[must_use]
    pub fn new(message: impl Into<String>, timed_out: bool) -> Self {
        Self {
            message: message.into(),
            timed_out,
        }
    }

    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        Self::new(crate::http::sanitize_reqwest_error(&value), value.is_timeout())
    }
}

impl From<TransportError> for ApiError {
    fn from(value: TransportError) -> Self {
        let status = if value.timed_out {
            StatusCode::REQUEST_TIMEOUT
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        ApiError::with_status(value.to_string(), status)
    }
}

/// Startup-time configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is absent from the configuration document.
    #[error("Configuration error: missing {0}")]
    Missing(&'static str),

    #[error("Configuration error: invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Configuration error: outbound auth token is not a valid header value")]
    InvalidToken,

    #[error("Configuration error: {0}")]
    Invalid(String),

    /// The configuration file could not be read.
    #[error("Configuration error: cannot read {path}: {message}")]
    Unreadable { path: String, message: String },

    /// The configuration file is not a valid document (bad JSON or a value of the wrong type).
    #[error("Configuration error: cannot parse {path}: {message}")]
    Parse { path: String, message: String },

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Client(String),
}
