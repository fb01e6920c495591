//! Inbound bearer-token gate for tool calls.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use hmac::{Hmac, Mac as _};
use ogc_mcp_client::{ApiError, AppConfig};
use sha2::Sha256;
use std::future::Future;

type HmacSha256 = Hmac<Sha256>;

/// Fixed key used only to reduce tokens to equal-length tags before comparison.
const TAG_KEY: &[u8] = b"ogc-mcp-backend/bearer-gate/v1";

/// Why an inbound call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// The server has no `AUTH_TOKEN`; fail closed.
    NotConfigured,
    MissingHeader,
    /// Present, but not `Bearer <token>`.
    MalformedHeader,
    TokenMismatch,
}

impl AuthRejection {
    #[must_use]
    pub fn into_api_error(self) -> ApiError {
        match self {
            AuthRejection::NotConfigured => {
                ApiError::internal("Server auth not configured (missing AUTH_TOKEN in config)")
            }
            AuthRejection::MissingHeader | AuthRejection::MalformedHeader => {
                ApiError::unauthorized(
                    "Missing or invalid Authorization header (expected Bearer token)",
                )
            }
            AuthRejection::TokenMismatch => ApiError::unauthorized("Invalid token"),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            AuthRejection::NotConfigured => "not_configured",
            AuthRejection::MissingHeader => "missing_header",
            AuthRejection::MalformedHeader => "malformed_header",
            AuthRejection::TokenMismatch => "token_mismatch",
        }
    }
}

/// Validates `Authorization: Bearer <token>` against the configured token.
///
/// The expected token is reduced to an HMAC tag once; each presented token is tagged the same
/// way and compared with a constant-time check, so neither the token length nor a shared prefix
/// affects timing.
#[derive(Clone)]
pub struct BearerGate {
    expected_tag: Option<Vec<u8>>,
}

impl std::fmt::Debug for BearerGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerGate")
            .field("configured", &self.expected_tag.is_some())
            .finish()
    }
}

impl BearerGate {
    /// `expected` is trimmed; blank counts as unset.
    #[must_use]
    pub fn new(expected: Option<&str>) -> Self {
        let expected_tag = expected
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .and_then(token_mac)
            .map(|mac| mac.finalize().into_bytes().to_vec());
        Self { expected_tag }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.expected_token())
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.expected_tag.is_some()
    }

    /// # Errors
    ///
    /// Returns the reason the headers do not carry the expected bearer token.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthRejection> {
        let Some(expected_tag) = self.expected_tag.as_deref() else {
            return Err(AuthRejection::NotConfigured);
        };
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthRejection::MissingHeader)?;
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AuthRejection::MalformedHeader)?;

        token_mac(token)
            .ok_or(AuthRejection::TokenMismatch)?
            .verify_slice(expected_tag)
            .map_err(|_| AuthRejection::TokenMismatch)
    }

    /// Like [`BearerGate::check`], with the rejection expressed as an [`ApiError`]
    /// (500 when unconfigured, 401 otherwise).
    ///
    /// # Errors
    ///
    /// Returns an error when the call is not authorized.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        self.check(headers).map_err(|rejection| {
            tracing::warn!(reason = rejection.as_str(), "inbound tool call rejected");
            rejection.into_api_error()
        })
    }

    /// Run `op` once if `headers` are authorized; its result is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the auth error without calling `op`, or whatever `op` returns.
    pub async fn guard<T, F, Fut>(&self, headers: &HeaderMap, op: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.authorize(headers)?;
        op().await
    }
}

fn token_mac(token: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(TAG_KEY).ok()?;
    mac.update(token.as_bytes());
    Some(mac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn headers(authorization: Option<&'static str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(v) = authorization {
            h.insert(AUTHORIZATION, HeaderValue::from_static(v));
        }
        h
    }

    #[test]
    fn unconfigured_gate_fails_closed_with_internal_error() {
        for gate in [BearerGate::new(None), BearerGate::new(Some("   "))] {
            assert!(!gate.is_configured());
            assert_eq!(
                gate.check(&headers(Some("Bearer anything"))),
                Err(AuthRejection::NotConfigured)
            );
            let err = gate.authorize(&headers(Some("Bearer anything"))).unwrap_err();
            assert_eq!(err.status_code(), 500);
            assert!(err.message().contains("not configured"));
        }
    }

    #[test]
    fn header_states() {
        let gate = BearerGate::new(Some("secret"));
        assert_eq!(gate.check(&headers(None)), Err(AuthRejection::MissingHeader));
        assert_eq!(
            gate.check(&headers(Some("Basic c2VjcmV0"))),
            Err(AuthRejection::MalformedHeader)
        );
        assert_eq!(
            gate.check(&headers(Some("bearer secret"))),
            Err(AuthRejection::MalformedHeader)
        );
        assert_eq!(
            gate.check(&headers(Some("Bearer wrongtoken"))),
            Err(AuthRejection::TokenMismatch)
        );
        assert_eq!(
            gate.check(&headers(Some("Bearer secre"))),
            Err(AuthRejection::TokenMismatch)
        );
        assert_eq!(gate.check(&headers(Some("Bearer secret"))), Ok(()));
        assert_eq!(gate.check(&headers(Some("Bearer   secret  "))), Ok(()));
    }

    #[test]
    fn rejections_map_to_unauthorized() {
        let gate = BearerGate::new(Some("secret"));
        for h in [
            headers(None),
            headers(Some("Token secret")),
            headers(Some("Bearer wrongtoken")),
        ] {
            assert_eq!(gate.authorize(&h).unwrap_err().status_code(), 401);
        }
    }

    #[test]
    fn configured_token_is_trimmed() {
        let gate = BearerGate::new(Some("  secret \n"));
        assert!(gate.check(&headers(Some("Bearer secret"))).is_ok());
    }

    #[tokio::test]
    async fn guard_invokes_operation_once_when_authorized() {
        let gate = BearerGate::new(Some("secret"));
        let calls = AtomicU32::new(0);

        let out = gate
            .guard(&headers(Some("Bearer secret")), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ApiError>("ran")
            })
            .await
            .expect("authorized");
        assert_eq!(out, "ran");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let err = gate
            .guard(&headers(Some("Bearer wrongtoken")), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ApiError>("ran")
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn guard_passes_operation_errors_through() {
        let gate = BearerGate::new(Some("secret"));
        let err = gate
            .guard(&headers(Some("Bearer secret")), || async {
                Err::<(), _>(ApiError::new("upstream gone").status(502))
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.message(), "upstream gone");
    }
}
