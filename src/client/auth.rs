//! Request authentication: classic API tokens and platform OAuth.
//!
//! Classic endpoints authenticate with the environment's access token;
//! platform endpoints use an OAuth client-credentials token fetched from
//! the SSO token endpoint and cached in memory until shortly before expiry.
//! Secret values never appear in logs — only variable names do.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::HttpError;
use crate::manifest::{OAuthCredentials, Secret};

use super::retry::{RetrySetting, send_with_retry};
use super::transport::{HttpRequest, HttpTransport};

/// Default SSO token endpoint, overridable per manifest or via
/// `MONCFG_SSO_TOKEN_ENDPOINT`.
pub const DEFAULT_SSO_TOKEN_ENDPOINT: &str =
    "https://sso.monitoring.example.com/sso/oauth2/token";

/// Environment variable overriding the default SSO token endpoint.
pub const SSO_TOKEN_ENDPOINT_VAR: &str = "MONCFG_SSO_TOKEN_ENDPOINT";

/// Renew tokens this long before their reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// The token endpoint to use for the given credentials.
///
/// Order: explicit manifest endpoint, process environment override, the
/// built-in default.
#[must_use]
pub fn token_endpoint(credentials: &OAuthCredentials) -> String {
    credentials.token_endpoint.clone().unwrap_or_else(|| {
        std::env::var(SSO_TOKEN_ENDPOINT_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SSO_TOKEN_ENDPOINT.to_string())
    })
}

/// Authentication for one [`RestClient`](super::RestClient).
#[derive(Debug, Clone)]
pub enum AuthProvider {
    /// Classic access token, sent as `Authorization: Api-Token <value>`.
    ApiToken(Secret),
    /// Platform OAuth bearer token, fetched and cached on demand.
    OAuth(Arc<OAuthTokenSource>),
}

impl AuthProvider {
    /// The `Authorization` header value for the next request.
    ///
    /// # Errors
    ///
    /// Propagates token-endpoint failures for the OAuth variant.
    pub fn authorization(&self, cancel: &CancelToken) -> Result<String, HttpError> {
        match self {
            Self::ApiToken(token) => Ok(format!("Api-Token {}", token.value())),
            Self::OAuth(source) => Ok(format!("Bearer {}", source.bearer_token(cancel)?)),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Fetches and caches OAuth client-credentials tokens.
pub struct OAuthTokenSource {
    transport: Arc<dyn HttpTransport>,
    token_url: String,
    credentials: OAuthCredentials,
    retry: RetrySetting,
    cache: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for OAuthTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenSource")
            .field("token_url", &self.token_url)
            .field("client_id", &self.credentials.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl OAuthTokenSource {
    /// Create a token source for the given credentials.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: OAuthCredentials,
        retry: RetrySetting,
    ) -> Self {
        let token_url = token_endpoint(&credentials);
        Self {
            transport,
            token_url,
            credentials,
            retry,
            cache: Mutex::new(None),
        }
    }

    /// A valid bearer token, from cache or freshly fetched.
    ///
    /// # Errors
    ///
    /// Fails when the token endpoint is unreachable, answers non-2xx, or
    /// returns an unexpected body.
    pub fn bearer_token(&self, cancel: &CancelToken) -> Result<String, HttpError> {
        if let Ok(guard) = self.cache.lock()
            && let Some(cached) = guard.as_ref()
            && cached.expires_at > Instant::now()
        {
            return Ok(cached.access_token.clone());
        }

        let token = self.fetch(cancel)?;
        if let Ok(mut guard) = self.cache.lock() {
            *guard = Some(token.clone());
        }
        Ok(token.access_token)
    }

    fn fetch(&self, cancel: &CancelToken) -> Result<CachedToken, HttpError> {
        tracing::debug!(
            "requesting OAuth token from {} (client id var '{}', present: {})",
            self.token_url,
            self.credentials.client_id.name,
            self.credentials.client_id.is_present(),
        );
        let body = format!(
            "grant_type=client_credentials&client_id={}&client_secret={}",
            form_encode(self.credentials.client_id.value()),
            form_encode(self.credentials.client_secret.value()),
        );
        let request = HttpRequest {
            method: super::transport::Method::Post,
            url: self.token_url.clone(),
            query: Vec::new(),
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body),
        };

        let response = send_with_retry(self.transport.as_ref(), cancel, &request, self.retry)?;
        if !response.is_success() {
            return Err(HttpError::Failure {
                status: response.status,
                url: self.token_url.clone(),
                excerpt: response.excerpt(),
            });
        }
        let parsed: TokenResponse = response.json(&self.token_url)?;
        let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(300));
        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}

/// Percent-encode a form value (RFC 3986 unreserved characters pass through).
fn form_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::client::transport::test_transport::MockTransport;

    fn credentials() -> OAuthCredentials {
        OAuthCredentials {
            client_id: Secret::new("CID_VAR", "client-id"),
            client_secret: Secret::new("CS_VAR", "s3cret+/="),
            token_endpoint: Some("https://sso.test/token".to_string()),
        }
    }

    fn fast() -> RetrySetting {
        RetrySetting {
            wait_time: Duration::from_millis(1),
            max_retries: 1,
        }
    }

    // -----------------------------------------------------------------------
    // form_encode
    // -----------------------------------------------------------------------

    #[test]
    fn form_encode_passes_unreserved() {
        assert_eq!(form_encode("abc-XYZ_0.9~"), "abc-XYZ_0.9~");
    }

    #[test]
    fn form_encode_escapes_reserved() {
        assert_eq!(form_encode("a+b/c="), "a%2Bb%2Fc%3D");
        assert_eq!(form_encode("sp ace"), "sp%20ace");
    }

    // -----------------------------------------------------------------------
    // token_endpoint
    // -----------------------------------------------------------------------

    #[test]
    fn manifest_endpoint_wins() {
        assert_eq!(token_endpoint(&credentials()), "https://sso.test/token");
    }

    #[test]
    fn default_endpoint_applies_without_override() {
        let creds = OAuthCredentials {
            token_endpoint: None,
            ..credentials()
        };
        // The env override is not set in tests, so the default applies.
        assert_eq!(token_endpoint(&creds), DEFAULT_SSO_TOKEN_ENDPOINT);
    }

    // -----------------------------------------------------------------------
    // AuthProvider
    // -----------------------------------------------------------------------

    #[test]
    fn api_token_header() {
        let provider = AuthProvider::ApiToken(Secret::new("VAR", "tok-123"));
        assert_eq!(
            provider.authorization(&CancelToken::new()).unwrap(),
            "Api-Token tok-123"
        );
    }

    #[test]
    fn oauth_fetches_and_caches_token() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            200,
            r#"{"access_token": "bearer-1", "token_type": "Bearer", "expires_in": 300}"#,
        )]));
        let source = Arc::new(OAuthTokenSource::new(
            Arc::clone(&mock) as Arc<dyn HttpTransport>,
            credentials(),
            fast(),
        ));
        let provider = AuthProvider::OAuth(Arc::clone(&source));
        let cancel = CancelToken::new();

        assert_eq!(provider.authorization(&cancel).unwrap(), "Bearer bearer-1");
        // Second call is served from the cache; the queue is already empty.
        assert_eq!(provider.authorization(&cancel).unwrap(), "Bearer bearer-1");
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn oauth_request_is_form_encoded() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            200,
            r#"{"access_token": "t"}"#,
        )]));
        let source = OAuthTokenSource::new(
            Arc::clone(&mock) as Arc<dyn HttpTransport>,
            credentials(),
            fast(),
        );
        source.bearer_token(&CancelToken::new()).unwrap();

        let request = &mock.requests()[0];
        assert_eq!(request.url, "https://sso.test/token");
        let body = request.body.as_deref().unwrap();
        assert!(body.contains("grant_type=client_credentials"));
        assert!(body.contains("client_id=client-id"));
        assert!(body.contains("client_secret=s3cret%2B%2F%3D"));
        assert!(
            request
                .headers
                .iter()
                .any(|(_, v)| v == "application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn token_endpoint_failure_is_reported() {
        let mock = Arc::new(MockTransport::with_responses(&[(401, "bad client")]));
        let source = OAuthTokenSource::new(
            Arc::clone(&mock) as Arc<dyn HttpTransport>,
            credentials(),
            fast(),
        );
        let err = source.bearer_token(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, HttpError::Failure { status: 401, .. }));
    }

    #[test]
    fn debug_output_hides_secret_values() {
        let mock = Arc::new(MockTransport::new());
        let source = OAuthTokenSource::new(mock as Arc<dyn HttpTransport>, credentials(), fast());
        let debug = format!("{source:?}");
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("client-id"));
    }
}
