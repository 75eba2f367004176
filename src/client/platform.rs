//! Clients for platform kinds: automation, buckets, documents, segments.
//!
//! All four authenticate with OAuth and upsert through a stable handle —
//! a coordinate-derived id or an `originObjectId` anchor — instead of
//! name matching.

use crate::api::Pagination;
use crate::error::HttpError;
use crate::model::AutomationResource;

use super::{RestClient, UpsertOutcome, item_id};

const AUTOMATION_BASE: &str = "/platform/automation/v1";
const BUCKETS_PATH: &str = "/platform/storage/management/v1/bucket-definitions";
const DOCUMENTS_PATH: &str = "/platform/document/v1/documents";
const SEGMENTS_PATH: &str = "/platform/storage/filter-segments/v1/filter-segments";

/// The OAuth-backed clients, bundled per environment.
#[derive(Debug)]
pub struct PlatformClients {
    /// Automation resources (workflows, calendars, scheduling rules).
    pub automation: AutomationClient,
    /// Grail storage buckets.
    pub buckets: BucketClient,
    /// Documents (dashboards, notebooks).
    pub documents: DocumentClient,
    /// Grail filter segments.
    pub segments: SegmentClient,
}

impl PlatformClients {
    /// Build all platform clients over one OAuth REST client.
    #[must_use]
    pub fn new(rest: RestClient) -> Self {
        Self {
            automation: AutomationClient { rest: rest.clone() },
            buckets: BucketClient { rest: rest.clone() },
            documents: DocumentClient { rest: rest.clone() },
            segments: SegmentClient { rest },
        }
    }
}

/// Collection path for one automation resource.
fn automation_path(resource: AutomationResource) -> String {
    let segment = match resource {
        AutomationResource::Workflow => "workflows",
        AutomationResource::BusinessCalendar => "business-calendars",
        AutomationResource::SchedulingRule => "scheduling-rules",
    };
    format!("{AUTOMATION_BASE}/{segment}")
}

/// Client for automation resources.
#[derive(Debug)]
pub struct AutomationClient {
    rest: RestClient,
}

impl AutomationClient {
    /// List all objects of one automation resource.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub fn list(
        &self,
        resource: AutomationResource,
    ) -> Result<Vec<serde_json::Value>, HttpError> {
        self.rest
            .list(&automation_path(resource), &[], Pagination::V2)
    }

    /// Upsert by the coordinate-derived object id.
    ///
    /// Updates the known id; a 404 creates the object carrying that id so
    /// the handle stays stable across runs.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn upsert(
        &self,
        resource: AutomationResource,
        id: &str,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, HttpError> {
        let mut body = payload.clone();
        if let Some(map) = body.as_object_mut() {
            map.insert("id".to_string(), serde_json::json!(id));
        }
        let path = format!("{}/{id}", automation_path(resource));
        let response = self.rest.put_json_raw(&path, &body)?;
        if response.status == 404 {
            self.rest.post_json(&automation_path(resource), &body)?;
            return Ok(UpsertOutcome {
                id: id.to_string(),
                created: true,
            });
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
    pub fn delete(&self, resource: AutomationResource, id: &str) -> Result<bool, HttpError> {
        self.rest
            .delete(&format!("{}/{id}", automation_path(resource)))
    }
}

/// Client for grail storage buckets (identity: bucket name).
#[derive(Debug)]
pub struct BucketClient {
    rest: RestClient,
}

impl BucketClient {
    /// List all bucket definitions.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub fn list(&self) -> Result<Vec<serde_json::Value>, HttpError> {
        self.rest.list(BUCKETS_PATH, &[], Pagination::V2)
    }

    /// Fetch one bucket definition, `None` when absent.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn get(&self, bucket_name: &str) -> Result<Option<serde_json::Value>, HttpError> {
        self.rest
            .get_json_optional(&format!("{BUCKETS_PATH}/{bucket_name}"))
    }

    /// Create or update a bucket by name.
    ///
    /// Updates must carry the current `version` for optimistic concurrency,
    /// so it is copied from the live definition into the payload.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn upsert(
        &self,
        bucket_name: &str,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, HttpError> {
        let mut body = payload.clone();
        if let Some(map) = body.as_object_mut() {
            map.insert("bucketName".to_string(), serde_json::json!(bucket_name));
        }
        match self.get(bucket_name)? {
            Some(existing) => {
                if let (Some(version), Some(map)) = (existing.get("version"), body.as_object_mut())
                {
                    map.insert("version".to_string(), version.clone());
                }
                self.rest
                    .put_json(&format!("{BUCKETS_PATH}/{bucket_name}"), &body)?;
                Ok(UpsertOutcome {
                    id: bucket_name.to_string(),
                    created: false,
                })
            }
            None => {
                self.rest.post_json(BUCKETS_PATH, &body)?;
                Ok(UpsertOutcome {
                    id: bucket_name.to_string(),
                    created: true,
                })
            }
        }
    }

    /// Delete a bucket; `Ok(false)` when it was already gone.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn delete(&self, bucket_name: &str) -> Result<bool, HttpError> {
        self.rest.delete(&format!("{BUCKETS_PATH}/{bucket_name}"))
    }
}

/// Client for documents (dashboards, notebooks).
#[derive(Debug)]
pub struct DocumentClient {
    rest: RestClient,
}

impl DocumentClient {
    /// List all documents of one kind.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub fn list(&self, kind: &str) -> Result<Vec<serde_json::Value>, HttpError> {
        let filter = format!("type=='{kind}'");
        self.rest
            .list(DOCUMENTS_PATH, &[("filter", filter.as_str())], Pagination::V2)
    }

    /// Fetch one document's content.
    ///
    /// # Errors
    ///
    /// Fails on non-2xx responses.
    pub fn get_content(&self, id: &str) -> Result<serde_json::Value, HttpError> {
        self.rest
            .get_json(&format!("{DOCUMENTS_PATH}/{id}/content"), &[])
    }

    /// Upsert by externalId, or directly by a known object id.
    ///
    /// Without an origin id the externalId filter decides between update
    /// and create; the platform keeps externalIds unique per document.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn upsert(
        &self,
        external_id: &str,
        origin_object_id: Option<&str>,
        name: &str,
        kind: &str,
        private: bool,
        content: &serde_json::Value,
    ) -> Result<UpsertOutcome, HttpError> {
        let body = serde_json::json!({
            "name": name,
            "type": kind,
            "isPrivate": private,
            "externalId": external_id,
            "content": content,
        });

        if let Some(id) = origin_object_id {
            self.rest
                .put_json(&format!("{DOCUMENTS_PATH}/{id}"), &body)?;
            return Ok(UpsertOutcome {
                id: id.to_string(),
                created: false,
            });
        }

        let filter = format!("externalId=='{external_id}'");
        let matches =
            self.rest
                .list(DOCUMENTS_PATH, &[("filter", filter.as_str())], Pagination::V2)?;
        match matches.first().and_then(item_id) {
            Some(id) => {
                self.rest
                    .put_json(&format!("{DOCUMENTS_PATH}/{id}"), &body)?;
                Ok(UpsertOutcome { id, created: false })
            }
            None => {
                let response = self.rest.post_json(DOCUMENTS_PATH, &body)?;
                let created: serde_json::Value = response.json(DOCUMENTS_PATH)?;
                let id = item_id(&created).ok_or_else(|| HttpError::UnexpectedResponse {
                    url: DOCUMENTS_PATH.to_string(),
                    message: "document creation response carries no id".to_string(),
                })?;
                Ok(UpsertOutcome { id, created: true })
            }
        }
    }

    /// Delete a document; `Ok(false)` when it was already gone.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn delete(&self, id: &str) -> Result<bool, HttpError> {
        self.rest.delete(&format!("{DOCUMENTS_PATH}/{id}"))
    }
}

/// Client for grail filter segments.
#[derive(Debug)]
pub struct SegmentClient {
    rest: RestClient,
}

impl SegmentClient {
    /// List all filter segments.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub fn list(&self) -> Result<Vec<serde_json::Value>, HttpError> {
        self.rest.list(SEGMENTS_PATH, &[], Pagination::V2)
    }

    /// Upsert a segment through its stable handle.
    ///
    /// With an origin id the update goes straight there. Otherwise the live
    /// listing is matched on externalId; on a hit, the existing object's
    /// `uid` and `owner` are propagated into the update payload (the
    /// platform requires both), and a miss creates a new segment.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn upsert(
        &self,
        external_id: &str,
        origin_object_id: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, HttpError> {
        let mut body = payload.clone();
        if let Some(map) = body.as_object_mut() {
            map.insert("externalId".to_string(), serde_json::json!(external_id));
        }

        if let Some(uid) = origin_object_id {
            if let Some(map) = body.as_object_mut() {
                map.insert("uid".to_string(), serde_json::json!(uid));
            }
            self.rest
                .put_json(&format!("{SEGMENTS_PATH}/{uid}"), &body)?;
            return Ok(UpsertOutcome {
                id: uid.to_string(),
                created: false,
            });
        }

        let existing = self.list()?.into_iter().find(|item| {
            item.get("externalId").and_then(serde_json::Value::as_str) == Some(external_id)
        });
        match existing {
            Some(live) => {
                let uid = item_id(&live).ok_or_else(|| HttpError::UnexpectedResponse {
                    url: SEGMENTS_PATH.to_string(),
                    message: "segment listing entry carries no uid".to_string(),
                })?;
                if let Some(map) = body.as_object_mut() {
                    map.insert("uid".to_string(), serde_json::json!(uid));
                    if let Some(owner) = live.get("owner") {
                        map.insert("owner".to_string(), owner.clone());
                    }
                }
                self.rest
                    .put_json(&format!("{SEGMENTS_PATH}/{uid}"), &body)?;
                Ok(UpsertOutcome {
                    id: uid,
                    created: false,
                })
            }
            None => {
                let response = self.rest.post_json(SEGMENTS_PATH, &body)?;
                let created: serde_json::Value = response.json(SEGMENTS_PATH)?;
                let uid = item_id(&created).ok_or_else(|| HttpError::UnexpectedResponse {
                    url: SEGMENTS_PATH.to_string(),
                    message: "segment creation response carries no uid".to_string(),
                })?;
                Ok(UpsertOutcome {
                    id: uid,
                    created: true,
                })
            }
        }
    }

    /// Delete a segment; `Ok(false)` when it was already gone.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub fn delete(&self, uid: &str) -> Result<bool, HttpError> {
        self.rest.delete(&format!("{SEGMENTS_PATH}/{uid}"))
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

    fn clients(mock: &Arc<MockTransport>) -> PlatformClients {
        PlatformClients::new(RestClient::new(
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

    // -----------------------------------------------------------------------
    // Automation
    // -----------------------------------------------------------------------

    #[test]
    fn automation_upsert_puts_by_stable_id() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, "{}")]));
        let outcome = clients(&mock)
            .automation
            .upsert(
                AutomationResource::Workflow,
                "uuid-1",
                &serde_json::json!({"title": "nightly"}),
            )
            .unwrap();
        assert_eq!(outcome.id, "uuid-1");
        assert!(!outcome.created);

        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::Put);
        assert!(
            request
                .url
                .ends_with("/platform/automation/v1/workflows/uuid-1")
        );
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["id"], "uuid-1");
    }

    #[test]
    fn automation_upsert_creates_on_404() {
        let mock = Arc::new(MockTransport::with_responses(&[(404, ""), (201, "{}")]));
        let outcome = clients(&mock)
            .automation
            .upsert(
                AutomationResource::SchedulingRule,
                "uuid-2",
                &serde_json::json!({}),
            )
            .unwrap();
        assert!(outcome.created);
        let requests = mock.requests();
        assert_eq!(requests[1].method, Method::Post);
        assert!(
            requests[1]
                .url
                .ends_with("/platform/automation/v1/scheduling-rules")
        );
    }

    // -----------------------------------------------------------------------
    // Buckets
    // -----------------------------------------------------------------------

    #[test]
    fn bucket_upsert_creates_when_absent() {
        let mock = Arc::new(MockTransport::with_responses(&[(404, ""), (201, "{}")]));
        let outcome = clients(&mock)
            .buckets
            .upsert("logs_gold", &serde_json::json!({"retentionDays": 35}))
            .unwrap();
        assert!(outcome.created);
        let body: serde_json::Value =
            serde_json::from_str(mock.requests()[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["bucketName"], "logs_gold");
    }

    #[test]
    fn bucket_upsert_propagates_version_on_update() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"bucketName": "logs_gold", "version": 7}"#),
            (200, "{}"),
        ]));
        let outcome = clients(&mock)
            .buckets
            .upsert("logs_gold", &serde_json::json!({"retentionDays": 35}))
            .unwrap();
        assert!(!outcome.created);
        let body: serde_json::Value =
            serde_json::from_str(mock.requests()[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["version"], 7);
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    #[test]
    fn document_upsert_matches_external_id() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"documents": [{"id": "doc-1", "externalId": "ext-1"}]}"#),
            (200, "{}"),
        ]));
        let outcome = clients(&mock)
            .documents
            .upsert("ext-1", None, "Board", "dashboard", false, &serde_json::json!({}))
            .unwrap();
        assert_eq!(outcome.id, "doc-1");
        assert!(!outcome.created);
        assert_eq!(mock.requests()[1].method, Method::Put);
    }

    #[test]
    fn document_upsert_creates_when_no_match() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"documents": []}"#),
            (201, r#"{"id": "doc-2"}"#),
        ]));
        let outcome = clients(&mock)
            .documents
            .upsert("ext-2", None, "Board", "dashboard", true, &serde_json::json!({}))
            .unwrap();
        assert_eq!(outcome.id, "doc-2");
        assert!(outcome.created);
        let body: serde_json::Value =
            serde_json::from_str(mock.requests()[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["isPrivate"], true);
        assert_eq!(body["externalId"], "ext-2");
    }

    #[test]
    fn document_upsert_prefers_origin_id() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, "{}")]));
        let outcome = clients(&mock)
            .documents
            .upsert(
                "ext-3",
                Some("origin-9"),
                "Board",
                "notebook",
                false,
                &serde_json::json!({}),
            )
            .unwrap();
        assert_eq!(outcome.id, "origin-9");
        assert_eq!(mock.request_count(), 1, "no listing when origin id is set");
    }

    // -----------------------------------------------------------------------
    // Segments
    // -----------------------------------------------------------------------

    #[test]
    fn segment_upsert_by_origin_puts_directly() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, "{}")]));
        let outcome = clients(&mock)
            .segments
            .upsert("ext-1", Some("uid-5"), &serde_json::json!({"name": "s"}))
            .unwrap();
        assert_eq!(outcome.id, "uid-5");
        let body: serde_json::Value =
            serde_json::from_str(mock.requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["uid"], "uid-5");
        assert_eq!(body["externalId"], "ext-1");
    }

    #[test]
    fn segment_upsert_matches_external_id_and_propagates_owner() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (
                200,
                r#"{"filterSegments": [{"uid": "uid-7", "externalId": "ext-1", "owner": "user-3"}]}"#,
            ),
            (200, "{}"),
        ]));
        let outcome = clients(&mock)
            .segments
            .upsert("ext-1", None, &serde_json::json!({"name": "s"}))
            .unwrap();
        assert_eq!(outcome.id, "uid-7");
        let body: serde_json::Value =
            serde_json::from_str(mock.requests()[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["owner"], "user-3");
        assert_eq!(body["uid"], "uid-7");
    }

    #[test]
    fn segment_upsert_creates_when_no_match() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"filterSegments": []}"#),
            (201, r#"{"uid": "uid-8"}"#),
        ]));
        let outcome = clients(&mock)
            .segments
            .upsert("ext-9", None, &serde_json::json!({"name": "s"}))
            .unwrap();
        assert_eq!(outcome.id, "uid-8");
        assert!(outcome.created);
    }
}
