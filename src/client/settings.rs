//! Client for settings 2.0 objects (externalId-based identity).

use crate::api::Pagination;
use crate::error::HttpError;

use super::{RestClient, UpsertOutcome, item_id};

/// Collection endpoint for settings objects.
const OBJECTS_PATH: &str = "/api/v2/settings/objects";

/// Fields requested when listing settings objects.
const LIST_FIELDS: &str = "objectId,externalId,schemaId,scope";

/// One settings object ready for upsert.
#[derive(Debug, Clone)]
pub struct SettingsObject<'a> {
    /// Schema id (e.g. `builtin:alerting.profile`).
    pub schema_id: &'a str,
    /// Optional schema version pin.
    pub schema_version: Option<&'a str>,
    /// Resolved scope.
    pub scope: &'a str,
    /// Coordinate-derived stable id; the platform de-duplicates on it.
    pub external_id: &'a str,
    /// The rendered object value.
    pub value: &'a serde_json::Value,
}

impl SettingsObject<'_> {
    fn payload(&self) -> serde_json::Value {
        let mut object = serde_json::json!({
            "schemaId": self.schema_id,
            "scope": self.scope,
            "externalId": self.external_id,
            "value": self.value,
        });
        if let (Some(version), Some(map)) = (self.schema_version, object.as_object_mut()) {
            map.insert("schemaVersion".to_string(), serde_json::json!(version));
        }
        object
    }
}

/// Client for the settings objects endpoint.
#[derive(Debug)]
pub struct SettingsClient {
    rest: RestClient,
}

impl SettingsClient {
    /// Create the client over a token-authenticated REST client.
    #[must_use]
    pub const fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// List all objects of one schema (summaries only).
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub fn list(&self, schema_id: &str) -> Result<Vec<serde_json::Value>, HttpError> {
        self.rest.list(
            OBJECTS_PATH,
            &[
                ("schemaIds", schema_id),
                ("fields", LIST_FIELDS),
                ("pageSize", "500"),
            ],
            Pagination::V2,
        )
    }

    /// Upsert via the platform's externalId de-duplication.
    ///
    /// # Errors
    ///
    /// Fails on non-2xx responses or an unexpected response shape.
    pub fn upsert(&self, object: &SettingsObject<'_>) -> Result<UpsertOutcome, HttpError> {
        let payload = serde_json::Value::Array(vec![object.payload()]);
        let response = self.rest.post_json(OBJECTS_PATH, &payload)?;
        let results: Vec<serde_json::Value> = response.json(OBJECTS_PATH)?;
        let object_id = results
            .first()
            .and_then(item_id)
            .ok_or_else(|| HttpError::UnexpectedResponse {
                url: OBJECTS_PATH.to_string(),
                message: "settings upsert response carries no objectId".to_string(),
            })?;
        Ok(UpsertOutcome {
            id: object_id,
            created: false,
        })
    }

    /// Update a known object id, adopting the externalId on the way.
    ///
    /// # Errors
    ///
    /// Fails on non-2xx responses.
    pub fn update_by_object_id(
        &self,
        object_id: &str,
        object: &SettingsObject<'_>,
    ) -> Result<UpsertOutcome, HttpError> {
        let mut payload = serde_json::json!({
            "value": object.value,
            "externalId": object.external_id,
        });
        if let (Some(version), Some(map)) = (object.schema_version, payload.as_object_mut()) {
            map.insert("schemaVersion".to_string(), serde_json::json!(version));
        }
        self.rest
            .put_json(&format!("{OBJECTS_PATH}/{object_id}"), &payload)?;
        Ok(UpsertOutcome {
            id: object_id.to_string(),
            created: false,
        })
    }

    /// Delete an object; `Ok(false)` when it was already gone.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn delete(&self, object_id: &str) -> Result<bool, HttpError> {
        self.rest.delete(&format!("{OBJECTS_PATH}/{object_id}"))
    }

    /// List all objects of one schema including their values (for download).
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub fn list_with_values(&self, schema_id: &str) -> Result<Vec<serde_json::Value>, HttpError> {
        self.rest.list(
            OBJECTS_PATH,
            &[
                ("schemaIds", schema_id),
                ("fields", "objectId,externalId,schemaId,scope,value"),
                ("pageSize", "500"),
            ],
            Pagination::V2,
        )
    }

    /// All schema ids available on the environment.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub fn list_schema_ids(&self) -> Result<Vec<String>, HttpError> {
        let items = self
            .rest
            .list("/api/v2/settings/schemas", &[], Pagination::V2)?;
        Ok(items
            .iter()
            .filter_map(|item| {
                item.get("schemaId")
                    .and_then(serde_json::Value::as_str)
                    .map(ToString::to_string)
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::client::auth::AuthProvider;
    use crate::client::retry::RetrySetting;
    use crate::client::transport::test_transport::MockTransport;
    use crate::client::transport::{HttpTransport, Method};
    use crate::manifest::Secret;
    use std::sync::Arc;
    use std::time::Duration;

    fn client(mock: &Arc<MockTransport>) -> SettingsClient {
        SettingsClient::new(RestClient::new(
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

    fn object<'a>(value: &'a serde_json::Value) -> SettingsObject<'a> {
        SettingsObject {
            schema_id: "builtin:alerting.profile",
            schema_version: Some("1.0"),
            scope: "environment",
            external_id: "moncfg:abc",
            value,
        }
    }

    #[test]
    fn upsert_posts_array_payload_with_external_id() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            200,
            r#"[{"code": 200, "objectId": "obj-1"}]"#,
        )]));
        let value = serde_json::json!({"enabled": true});
        let outcome = client(&mock).upsert(&object(&value)).unwrap();
        assert_eq!(outcome.id, "obj-1");

        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::Post);
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert!(body.is_array());
        assert_eq!(body[0]["externalId"], "moncfg:abc");
        assert_eq!(body[0]["schemaId"], "builtin:alerting.profile");
        assert_eq!(body[0]["schemaVersion"], "1.0");
        assert_eq!(body[0]["scope"], "environment");
        assert_eq!(body[0]["value"]["enabled"], true);
    }

    #[test]
    fn upsert_without_object_id_in_response_fails() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, r"[{}]")]));
        let value = serde_json::json!({});
        let err = client(&mock).upsert(&object(&value)).unwrap_err();
        assert!(matches!(err, HttpError::UnexpectedResponse { .. }));
    }

    #[test]
    fn update_by_object_id_puts_value_and_external_id() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, "{}")]));
        let value = serde_json::json!({"enabled": false});
        let outcome = client(&mock)
            .update_by_object_id("obj-9", &object(&value))
            .unwrap();
        assert_eq!(outcome.id, "obj-9");

        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::Put);
        assert!(request.url.ends_with("/api/v2/settings/objects/obj-9"));
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["externalId"], "moncfg:abc");
    }

    #[test]
    fn list_requests_summary_fields() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, r#"{"items": []}"#)]));
        client(&mock).list("builtin:alerting.profile").unwrap();
        let request = &mock.requests()[0];
        assert!(
            request
                .query
                .iter()
                .any(|(k, v)| k == "schemaIds" && v == "builtin:alerting.profile")
        );
        assert!(request.query.iter().any(|(k, _)| k == "fields"));
    }
}
