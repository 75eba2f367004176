//! The API client set: transport-independent access to every config kind.
//!
//! [`RestClient`] couples a transport with one environment's base URL, auth,
//! retry budget, and cancellation token. The per-kind clients
//! ([`ClassicClient`], [`SettingsClient`], and the platform clients) add the
//! endpoint knowledge and idempotent upsert contracts; [`ClientSet`] bundles
//! them per environment. Callers pass logical kinds and payloads only —
//! tokens and OAuth credentials stay inside the clients.

pub mod auth;
mod classic;
pub mod pagination;
mod platform;
pub mod retry;
mod settings;
pub mod transport;

use std::sync::Arc;

pub use classic::ClassicClient;
pub use platform::{AutomationClient, BucketClient, DocumentClient, PlatformClients, SegmentClient};
pub use settings::{SettingsClient, SettingsObject};

use crate::api::Pagination;
use crate::cancel::CancelToken;
use crate::error::HttpError;
use crate::manifest::EnvironmentDefinition;

use auth::{AuthProvider, OAuthTokenSource};
use retry::{DEFAULT_RETRY_SETTINGS, RetrySetting, send_with_retry};
use transport::{HttpRequest, HttpResponse, HttpTransport};

/// The result of one idempotent upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    /// The object's id on the platform (assigned or stable).
    pub id: String,
    /// `true` when a new object was created, `false` for an update.
    pub created: bool,
}

/// A REST client bound to one environment and auth identity.
#[derive(Debug, Clone)]
pub struct RestClient {
    transport: Arc<dyn HttpTransport>,
    cancel: CancelToken,
    base_url: String,
    auth: AuthProvider,
    retry: RetrySetting,
}

impl RestClient {
    /// Create a client for `base_url` with the given auth.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cancel: CancelToken,
        base_url: impl Into<String>,
        auth: AuthProvider,
        retry: RetrySetting,
    ) -> Self {
        Self {
            transport,
            cancel,
            base_url: base_url.into(),
            auth,
            retry,
        }
    }

    /// A copy of this client with a different retry budget.
    #[must_use]
    pub fn with_retry(&self, retry: RetrySetting) -> Self {
        Self {
            retry,
            ..self.clone()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send one request with auth applied and the retry wrapper around it.
    fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let authorization = self.auth.authorization(&self.cancel)?;
        request.headers.push(("Authorization".to_string(), authorization));
        send_with_retry(self.transport.as_ref(), &self.cancel, &request, self.retry)
    }

    /// Send and require a 2xx response.
    fn send_expect_success(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = request.url.clone();
        let response = self.send(request)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(HttpError::Failure {
                status: response.status,
                url,
                excerpt: response.excerpt(),
            })
        }
    }

    /// GET a path and parse the body as JSON.
    pub(crate) fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, HttpError> {
        let url = self.url(path);
        let mut request = HttpRequest::get(&url);
        for (k, v) in query {
            request = request.with_query(*k, *v);
        }
        let response = self.send_expect_success(request)?;
        response.json(&url)
    }

    /// GET a path, returning `None` for 404.
    pub(crate) fn get_json_optional(
        &self,
        path: &str,
    ) -> Result<Option<serde_json::Value>, HttpError> {
        let url = self.url(path);
        let response = self.send(HttpRequest::get(&url))?;
        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(HttpError::Failure {
                status: response.status,
                url,
                excerpt: response.excerpt(),
            });
        }
        response.json(&url).map(Some)
    }

    /// List every page of a collection endpoint.
    pub(crate) fn list(
        &self,
        path: &str,
        query: &[(&str, &str)],
        pagination: Pagination,
    ) -> Result<Vec<serde_json::Value>, HttpError> {
        let authorization = self.auth.authorization(&self.cancel)?;
        let mut request = HttpRequest::get(self.url(path))
            .with_header("Authorization", authorization);
        for (k, v) in query {
            request = request.with_query(*k, *v);
        }
        pagination::list_all_pages(
            self.transport.as_ref(),
            &self.cancel,
            &request,
            pagination,
            self.retry,
        )
    }

    /// POST a JSON payload, requiring success.
    pub(crate) fn post_json(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<HttpResponse, HttpError> {
        self.send_expect_success(HttpRequest::post(self.url(path), payload.to_string()))
    }

    /// PUT a JSON payload, requiring success.
    pub(crate) fn put_json(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<HttpResponse, HttpError> {
        self.send_expect_success(HttpRequest::put(self.url(path), payload.to_string()))
    }

    /// PUT a JSON payload, returning the raw response (404 is not an error).
    pub(crate) fn put_json_raw(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<HttpResponse, HttpError> {
        self.send(HttpRequest::put(self.url(path), payload.to_string()))
    }

    /// DELETE a path; `Ok(false)` when the object was already gone.
    pub(crate) fn delete(&self, path: &str) -> Result<bool, HttpError> {
        let url = self.url(path);
        let response = self.send(HttpRequest::delete(&url))?;
        if response.status == 404 {
            return Ok(false);
        }
        if response.is_success() {
            Ok(true)
        } else {
            Err(HttpError::Failure {
                status: response.status,
                url,
                excerpt: response.excerpt(),
            })
        }
    }
}

/// All per-kind clients for one environment.
#[derive(Debug)]
pub struct ClientSet {
    /// Classic environment APIs (token auth).
    pub classic: ClassicClient,
    /// Settings objects (token auth).
    pub settings: SettingsClient,
    platform: Option<PlatformClients>,
}

impl ClientSet {
    /// Build the client set for one environment.
    ///
    /// Platform clients are only present when the environment's auth carries
    /// OAuth credentials.
    #[must_use]
    pub fn for_environment(
        environment: &EnvironmentDefinition,
        transport: Arc<dyn HttpTransport>,
        cancel: CancelToken,
    ) -> Self {
        let token_rest = RestClient::new(
            Arc::clone(&transport),
            cancel.clone(),
            environment.url.clone(),
            AuthProvider::ApiToken(environment.auth.token().clone()),
            DEFAULT_RETRY_SETTINGS.normal,
        );

        let platform = environment.auth.o_auth().map(|credentials| {
            let source = Arc::new(OAuthTokenSource::new(
                Arc::clone(&transport),
                credentials.clone(),
                DEFAULT_RETRY_SETTINGS.normal,
            ));
            let platform_rest = RestClient::new(
                Arc::clone(&transport),
                cancel.clone(),
                environment.url.clone(),
                AuthProvider::OAuth(source),
                DEFAULT_RETRY_SETTINGS.long,
            );
            PlatformClients::new(platform_rest)
        });

        Self {
            classic: ClassicClient::new(token_rest.clone()),
            settings: SettingsClient::new(token_rest.with_retry(DEFAULT_RETRY_SETTINGS.long)),
            platform,
        }
    }

    /// The platform clients, when the environment has OAuth credentials.
    #[must_use]
    pub const fn platform(&self) -> Option<&PlatformClients> {
        self.platform.as_ref()
    }

    /// `true` when platform kinds can be addressed.
    #[must_use]
    pub const fn has_platform(&self) -> bool {
        self.platform.is_some()
    }
}

/// Best-effort extraction of an object id from a JSON object.
///
/// Listing and creation responses name the id field differently across
/// endpoints (`id`, `entityId`, `objectId`, `uid`).
#[must_use]
pub(crate) fn item_id(item: &serde_json::Value) -> Option<String> {
    ["id", "entityId", "objectId", "uid"]
        .iter()
        .find_map(|key| item.get(*key).and_then(serde_json::Value::as_str))
        .map(ToString::to_string)
}
