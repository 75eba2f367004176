//! Client for classic environment APIs (name-based identity).

use crate::api::ApiSpec;
use crate::error::HttpError;

use super::{RestClient, UpsertOutcome, item_id};

/// Client for every API in the known-API registry.
#[derive(Debug)]
pub struct ClassicClient {
    rest: RestClient,
}

impl ClassicClient {
    /// Create the client over a token-authenticated REST client.
    #[must_use]
    pub const fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// List all objects of an API (empty for single-configuration APIs).
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub fn list(
        &self,
        spec: &ApiSpec,
        scope: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, HttpError> {
        if spec.single_configuration {
            return Ok(Vec::new());
        }
        self.rest
            .list(&spec.resolve_path(scope), &[], spec.pagination)
    }

    /// Fetch one object's full body.
    ///
    /// # Errors
    ///
    /// Fails on non-2xx responses.
    pub fn get(
        &self,
        spec: &ApiSpec,
        scope: Option<&str>,
        id: &str,
    ) -> Result<serde_json::Value, HttpError> {
        if spec.single_configuration {
            return self.rest.get_json(&spec.resolve_path(scope), &[]);
        }
        self.rest
            .get_json(&object_path(spec, scope, id), &[])
    }

    /// Upsert by name: list candidates, then create or update.
    ///
    /// Zero matches create the object, exactly one updates it by id, and
    /// multiple matches fail with [`HttpError::AmbiguousMatch`].
    /// Single-configuration APIs skip the listing and always update.
    ///
    /// # Errors
    ///
    /// Propagates listing/request failures and ambiguous name matches.
    pub fn upsert_by_name(
        &self,
        spec: &ApiSpec,
        scope: Option<&str>,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, HttpError> {
        if spec.single_configuration {
            self.rest.put_json(&spec.resolve_path(scope), payload)?;
            return Ok(UpsertOutcome {
                id: spec.id.to_string(),
                created: false,
            });
        }

        let candidates = self.list(spec, scope)?;
        let matches: Vec<&serde_json::Value> = candidates
            .iter()
            .filter(|item| item.get("name").and_then(serde_json::Value::as_str) == Some(name))
            .collect();

        match matches.as_slice() {
            [] => self.create(spec, scope, name, payload),
            [single] => {
                let id = item_id(single).ok_or_else(|| HttpError::UnexpectedResponse {
                    url: spec.url_path.to_string(),
                    message: format!("list entry for '{name}' carries no id"),
                })?;
                self.rest.put_json(&object_path(spec, scope, &id), payload)?;
                Ok(UpsertOutcome { id, created: false })
            }
            many => Err(HttpError::AmbiguousMatch {
                name: name.to_string(),
                ids: many.iter().filter_map(|item| item_id(item)).collect(),
            }),
        }
    }

    /// Upsert by a known object id (origin anchors, referenced ids).
    ///
    /// A 404 on the update falls back to creating the object with the id in
    /// its payload, so re-deploying after an external deletion converges.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn upsert_by_id(
        &self,
        spec: &ApiSpec,
        scope: Option<&str>,
        id: &str,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, HttpError> {
        let path = object_path(spec, scope, id);
        let response = self.rest.put_json_raw(&path, payload)?;
        if response.status == 404 {
            let mut body = payload.clone();
            if let Some(map) = body.as_object_mut() {
                map.insert("id".to_string(), serde_json::json!(id));
            }
            return self.create(spec, scope, name, &body);
        }
        if !response.is_success() {
            return Err(HttpError::Failure {
                status: response.status,
                url: path,
                excerpt: response.excerpt(),
            });
        }
        Ok(UpsertOutcome {
            id: id.to_string(),
            created: false,
        })
    }

    /// Delete an object; `Ok(false)` when it was already gone.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn delete(
        &self,
        spec: &ApiSpec,
        scope: Option<&str>,
        id: &str,
    ) -> Result<bool, HttpError> {
        self.rest.delete(&object_path(spec, scope, id))
    }

    fn create(
        &self,
        spec: &ApiSpec,
        scope: Option<&str>,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, HttpError> {
        let path = spec.resolve_path(scope);
        let response = self.rest.post_json(&path, payload)?;
        let id = response
            .json::<serde_json::Value>(&path)
            .ok()
            .and_then(|body| item_id(&body));

        // Some creation endpoints answer with an empty body; fall back to
        // finding the fresh object by name.
        let id = match id {
            Some(id) => id,
            None => self
                .list(spec, scope)?
                .iter()
                .find(|item| {
                    item.get("name").and_then(serde_json::Value::as_str) == Some(name)
                })
                .and_then(item_id)
                .ok_or_else(|| HttpError::UnexpectedResponse {
                    url: path.clone(),
                    message: format!("created object '{name}' has no discoverable id"),
                })?,
        };
        Ok(UpsertOutcome { id, created: true })
    }
}

fn object_path(spec: &ApiSpec, scope: Option<&str>, id: &str) -> String {
    format!("{}/{id}", spec.resolve_path(scope))
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::api;
    use crate::cancel::CancelToken;
    use crate::client::auth::AuthProvider;
    use crate::client::retry::RetrySetting;
    use crate::client::transport::test_transport::MockTransport;
    use crate::client::transport::{HttpTransport, Method};
    use crate::manifest::Secret;
    use std::sync::Arc;
    use std::time::Duration;

    fn client(mock: &Arc<MockTransport>) -> ClassicClient {
        ClassicClient::new(RestClient::new(
            Arc::clone(mock) as Arc<dyn HttpTransport>,
            CancelToken::new(),
            "https://env.example.com",
            AuthProvider::ApiToken(Secret::new("T", "t")),
            RetrySetting {
                wait_time: Duration::from_millis(1),
                max_retries: 1,
            },
        ))
    }

    fn spec(id: &str) -> &'static ApiSpec {
        api::get(id).expect("known api")
    }

    #[test]
    fn upsert_creates_when_no_name_matches() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": []}"#),
            (201, r#"{"id": "new-1", "name": "My profile"}"#),
        ]));
        let outcome = client(&mock)
            .upsert_by_name(
                spec("alerting-profile"),
                None,
                "My profile",
                &serde_json::json!({"displayName": "My profile"}),
            )
            .unwrap();
        assert_eq!(outcome.id, "new-1");
        assert!(outcome.created);

        let requests = mock.requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[1].method, Method::Post);
        assert_eq!(
            requests[1].url,
            "https://env.example.com/api/config/v1/alertingProfiles"
        );
    }

    #[test]
    fn upsert_updates_single_match_by_id() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": [{"id": "existing-1", "name": "My profile"}]}"#),
            (204, ""),
        ]));
        let outcome = client(&mock)
            .upsert_by_name(
                spec("alerting-profile"),
                None,
                "My profile",
                &serde_json::json!({}),
            )
            .unwrap();
        assert_eq!(outcome.id, "existing-1");
        assert!(!outcome.created);

        let requests = mock.requests();
        assert_eq!(requests[1].method, Method::Put);
        assert!(requests[1].url.ends_with("/alertingProfiles/existing-1"));
    }

    #[test]
    fn upsert_fails_on_multiple_name_matches() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            200,
            r#"{"values": [{"id": "a", "name": "dup"}, {"id": "b", "name": "dup"}]}"#,
        )]));
        let err = client(&mock)
            .upsert_by_name(spec("alerting-profile"), None, "dup", &serde_json::json!({}))
            .unwrap_err();
        let HttpError::AmbiguousMatch { name, ids } = err else {
            panic!("expected AmbiguousMatch, got {err:?}")
        };
        assert_eq!(name, "dup");
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn single_configuration_api_always_puts() {
        let mock = Arc::new(MockTransport::with_responses(&[(204, "")]));
        let outcome = client(&mock)
            .upsert_by_name(
                spec("frequent-issue-detection"),
                None,
                "whatever",
                &serde_json::json!({}),
            )
            .unwrap();
        assert_eq!(outcome.id, "frequent-issue-detection");
        assert!(!outcome.created);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1, "no listing for singletons");
        assert_eq!(requests[0].method, Method::Put);
        assert!(requests[0].url.ends_with("/frequentIssueDetection"));
    }

    #[test]
    fn sub_path_api_substitutes_scope() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": []}"#),
            (201, r#"{"id": "kua-1"}"#),
        ]));
        client(&mock)
            .upsert_by_name(
                spec("key-user-actions-web"),
                Some("APPLICATION-42"),
                "login",
                &serde_json::json!({}),
            )
            .unwrap();
        assert!(
            mock.requests()[0]
                .url
                .contains("/applications/web/APPLICATION-42/keyUserActions")
        );
    }

    #[test]
    fn upsert_by_id_puts_directly() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, "{}")]));
        let outcome = client(&mock)
            .upsert_by_id(
                spec("dashboard"),
                None,
                "dash-7",
                "Board",
                &serde_json::json!({}),
            )
            .unwrap();
        assert_eq!(outcome.id, "dash-7");
        assert!(!outcome.created);
        assert_eq!(mock.requests()[0].method, Method::Put);
    }

    #[test]
    fn upsert_by_id_falls_back_to_create_on_404() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (404, "no such object"),
            (201, r#"{"id": "dash-7"}"#),
        ]));
        let outcome = client(&mock)
            .upsert_by_id(
                spec("dashboard"),
                None,
                "dash-7",
                "Board",
                &serde_json::json!({"tiles": []}),
            )
            .unwrap();
        assert!(outcome.created);
        let create_body: serde_json::Value =
            serde_json::from_str(mock.requests()[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(create_body["id"], "dash-7");
    }

    #[test]
    fn create_with_empty_body_finds_id_by_relisting() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": []}"#),
            (201, ""),
            (200, r#"{"values": [{"id": "found-1", "name": "zone"}]}"#),
        ]));
        let outcome = client(&mock)
            .upsert_by_name(spec("management-zone"), None, "zone", &serde_json::json!({}))
            .unwrap();
        assert_eq!(outcome.id, "found-1");
        assert!(outcome.created);
    }

    #[test]
    fn delete_returns_false_when_gone() {
        let mock = Arc::new(MockTransport::with_responses(&[(404, "")]));
        let deleted = client(&mock)
            .delete(spec("auto-tag"), None, "tag-1")
            .unwrap();
        assert!(!deleted);
    }
}
