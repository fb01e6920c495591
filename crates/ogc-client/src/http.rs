//! Single-shot outbound HTTP calls plus the shared response-interpretation helpers.
//!
//! [`HttpService`] performs exactly one request per [`HttpService::send`]; it never retries and
//! never hides a non-2xx status. Callers decide what a status means via
//! [`RawResponse::error_for_status`] and the `json_*` helpers.

use crate::config::ServiceEndpoint;
use crate::error::{ApiError, ConfigError, TransportError};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub type JsonObject = Map<String, Value>;

const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

/// One outbound request, built per call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Value>,
}

impl RequestSpec {
    /// `segments` are raw (unencoded) path segments relative to the service base URL.
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::GET, segments)
    }

    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::POST, segments)
    }

    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Rendered relative path (segments joined with `/`, not percent-encoded).
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Status, headers and body of one completed exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Header lookup (names are case-insensitive). Non-UTF-8 values are ignored.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert any status >= 400 into an [`ApiError`] carrying that status and the body text.
    ///
    /// # Errors
    ///
    /// Returns an error for 4xx/5xx responses.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.status.as_u16() < 400 {
            return Ok(self);
        }
        let text = self.text();
        let message = if text.is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            text
        };
        Err(ApiError::new(message).status(self.status.as_u16()))
    }

    /// Parse the body as JSON, falling back to `default` for an empty or malformed body.
    #[must_use]
    pub fn json_or(&self, default: Value) -> Value {
        if self.body.is_empty() {
            return default;
        }
        serde_json::from_slice(&self.body).unwrap_or(default)
    }

    /// Parse the body as JSON, falling back to an empty object.
    #[must_use]
    pub fn json_or_empty(&self) -> Value {
        self.json_or(Value::Object(JsonObject::new()))
    }

    /// Parse the body as a JSON object; anything else becomes an empty object.
    #[must_use]
    pub fn json_object(&self) -> JsonObject {
        match self.json_or_empty() {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        }
    }
}

/// Outbound HTTP primitive bound to one service endpoint.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: Client,
    base_url: Url,
    timeout: Option<Duration>,
    credential: Option<HeaderValue>,
    default_headers: HeaderMap,
    default_query: Vec<(String, String)>,
}

impl HttpService {
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path, if the outbound token is not a
    /// valid header value, or if the HTTP client cannot be built.
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self, ConfigError> {
        if endpoint.base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "base URL '{}' cannot carry a path",
                endpoint.base_url
            )));
        }

        let credential = endpoint
            .auth_token
            .as_deref()
            .map(bearer_credential)
            .transpose()?;

        // Idle connections are dropped right away: every call is independently scoped.
        let client = Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ConfigError::Client(sanitize_reqwest_error(&e)))?;

        Ok(Self {
            client,
            base_url: endpoint.base_url.clone(),
            timeout: endpoint.timeout,
            credential,
            default_headers: HeaderMap::new(),
            default_query: Vec::new(),
        })
    }

    /// Headers sent on every call (per-call headers win on conflict).
    #[must_use]
    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    /// Query parameters sent on every call, ahead of per-call parameters.
    #[must_use]
    pub fn with_default_query(mut self, query: Vec<(String, String)>) -> Self {
        self.default_query = query;
        self
    }

    /// Merge service defaults with per-call headers, then apply auth decoration.
    #[must_use]
    pub fn prepare_headers(&self, extra: &HeaderMap) -> HeaderMap {
        let mut merged = self.default_headers.clone();
        for (name, value) in extra {
            merged.insert(name.clone(), value.clone());
        }
        decorate_headers(&merged, self.credential.as_ref())
    }

    #[must_use]
    pub fn prepare_query(&self, extra: &[(String, String)]) -> Vec<(String, String)> {
        self.default_query.iter().chain(extra).cloned().collect()
    }

    /// Perform exactly one request.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] only when the exchange itself fails (connect, timeout, body
    /// read). HTTP error statuses are returned as a normal [`RawResponse`].
    pub async fn send(&self, spec: RequestSpec) -> Result<RawResponse, TransportError> {
        let url = self.build_url(&spec)?;
        let headers = self.prepare_headers(&spec.headers);

        let mut request = self.client.request(spec.method.clone(), url).headers(headers);
        if let Some(body) = spec.body.as_ref() {
            request = request.json(body);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(
            method = %spec.method,
            path = %spec.path(),
            status = status.as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "outbound request completed"
        );

        Ok(RawResponse::new(status, headers, body))
    }

    fn build_url(&self, spec: &RequestSpec) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                TransportError::new(format!("base URL '{}' cannot carry a path", self.base_url), false)
            })?;
            segments.pop_if_empty();
            segments.extend(spec.segments.iter().map(String::as_str));
        }

        let query = self.prepare_query(&spec.query);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

/// Return a copy of `base` carrying `Authorization: Bearer <token>` when a credential is set.
///
/// `base` itself is never modified.
#[must_use]
pub fn decorate_headers(base: &HeaderMap, credential: Option<&HeaderValue>) -> HeaderMap {
    let mut out = base.clone();
    if let Some(value) = credential {
        out.insert(AUTHORIZATION, value.clone());
    }
    out
}

/// Build the sensitive `Bearer <token>` header value.
///
/// # Errors
///
/// Returns an error if the token contains characters not allowed in a header value.
pub fn bearer_credential(token: &str) -> Result<HeaderValue, ConfigError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
        .map_err(|_| ConfigError::InvalidToken)?;
    value.set_sensitive(true);
    Ok(value)
}

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}
