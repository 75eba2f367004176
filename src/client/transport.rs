//! HTTP transport abstraction: a trait for sending one request.
//!
//! The engine never talks to `ureq` directly; everything goes through
//! [`HttpTransport`] so tests can swap in a scripted transport the same way
//! the rest of the codebase swaps executors for mocks. [`UreqTransport`] is
//! the production implementation.

use std::time::Duration;

use crate::error::HttpError;

/// Longest response-body excerpt carried inside errors.
const MAX_BODY_EXCERPT: usize = 256;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

/// One HTTP request, transport-independent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The method.
    pub method: Method,
    /// Absolute URL without query string.
    pub url: String,
    /// Query parameters, appended in order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Request body, when the method carries one.
    pub body: Option<String>,
}

impl HttpRequest {
    /// A GET request for `url`.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST request with a JSON body.
    #[must_use]
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.into()),
        }
    }

    /// A PUT request with a JSON body.
    #[must_use]
    pub fn put(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Put,
            url: url.into(),
            query: Vec::new(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.into()),
        }
    }

    /// A DELETE request for `url`.
    #[must_use]
    pub fn delete(url: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// One HTTP response: status and full body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The status code.
    pub status: u16,
    /// The response body as text.
    pub body: String,
}

impl HttpResponse {
    /// `true` for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::UnexpectedResponse`] when the body is not the
    /// expected shape; `url` names the request for the error message.
    pub fn json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        serde_json::from_str(&self.body).map_err(|e| HttpError::UnexpectedResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// A bounded excerpt of the body for error messages.
    #[must_use]
    pub fn excerpt(&self) -> String {
        excerpt(&self.body)
    }
}

/// Truncate a body to the bounded excerpt carried in errors.
#[must_use]
pub fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_EXCERPT {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_BODY_EXCERPT).collect();
        format!("{cut}…")
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations must not retry; retrying and pagination are layered on
/// top. Any status code is a successful transport outcome — only transport
/// failures (connect, TLS, timeout) are errors.
pub trait HttpTransport: std::fmt::Debug + Send + Sync {
    /// Send `request` once.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] when no response was received.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Production transport backed by a [`ureq::Agent`].
#[derive(Debug)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport with the given per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpTransport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let network_error = |e: ureq::Error| HttpError::Network {
            url: request.url.clone(),
            message: e.to_string(),
        };

        let result = match request.method {
            Method::Get => {
                let mut req = self.agent.get(&request.url);
                for (k, v) in &request.query {
                    req = req.query(k, v);
                }
                for (k, v) in &request.headers {
                    req = req.header(k, v);
                }
                req.call()
            }
            Method::Delete => {
                let mut req = self.agent.delete(&request.url);
                for (k, v) in &request.query {
                    req = req.query(k, v);
                }
                for (k, v) in &request.headers {
                    req = req.header(k, v);
                }
                req.call()
            }
            Method::Post => {
                let mut req = self.agent.post(&request.url);
                for (k, v) in &request.query {
                    req = req.query(k, v);
                }
                for (k, v) in &request.headers {
                    req = req.header(k, v);
                }
                req.send(request.body.as_deref().unwrap_or(""))
            }
            Method::Put => {
                let mut req = self.agent.put(&request.url);
                for (k, v) in &request.query {
                    req = req.query(k, v);
                }
                for (k, v) in &request.headers {
                    req = req.header(k, v);
                }
                req.send(request.body.as_deref().unwrap_or(""))
            }
        };

        let mut response = result.map_err(network_error)?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(network_error)?;
        Ok(HttpResponse { status, body })
    }
}
