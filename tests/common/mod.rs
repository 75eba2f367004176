// Shared helpers for integration tests.
//
// Provides an in-memory fake of the monitoring platform (implementing the
// engine's transport trait) plus tempdir-backed project fixtures, so each
// integration test can run the full pipeline without network or real
// credentials.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use moncfg_cli::client::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use moncfg_cli::error::HttpError;
use moncfg_cli::manifest::{Auth, EnvironmentDefinition, Manifest, OAuthCredentials, ProjectDefinition, Secret};

/// One stored object: the platform id plus the payload it was written with.
#[derive(Debug, Clone)]
struct StoredObject {
    id: String,
    body: serde_json::Value,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    /// Classic objects keyed by their collection path.
    classic: BTreeMap<String, Vec<StoredObject>>,
    /// Settings objects: `{objectId, externalId, schemaId, scope, value}`.
    settings: Vec<serde_json::Value>,
    /// Automation objects keyed by collection path, then by object id.
    automation: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    /// Request log: `(method, path)` pairs in call order.
    requests: Vec<(Method, String)>,
}

/// An in-memory monitoring platform behind the engine's transport trait.
///
/// Implements just enough of the classic config API, the settings objects
/// API, the automation API, and the SSO token endpoint for end-to-end
/// scenarios: create assigns ids, listings return summaries, settings
/// de-duplicate on externalId.
#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(method, path)` pairs seen so far.
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state
            .lock()
            .map_or_else(|_| Vec::new(), |s| s.requests.clone())
    }

    /// Count requests with the given method.
    pub fn count_method(&self, method: Method) -> usize {
        self.state.lock().map_or(0, |s| {
            s.requests.iter().filter(|(m, _)| *m == method).count()
        })
    }

    /// Names of all objects stored under a classic collection path.
    pub fn classic_names(&self, collection: &str) -> Vec<String> {
        let state = self.state.lock().expect("state lock");
        state
            .classic
            .get(collection)
            .map(|objects| {
                objects
                    .iter()
                    .filter_map(|o| o.body.get("name").and_then(serde_json::Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of objects stored under a classic collection path.
    pub fn classic_count(&self, collection: &str) -> usize {
        let state = self.state.lock().expect("state lock");
        state.classic.get(collection).map_or(0, Vec::len)
    }

    /// The stored body of one classic object.
    pub fn classic_body(&self, collection: &str, id: &str) -> Option<serde_json::Value> {
        let state = self.state.lock().expect("state lock");
        state
            .classic
            .get(collection)
            .and_then(|objects| objects.iter().find(|o| o.id == id))
            .map(|o| o.body.clone())
    }

    /// Number of stored settings objects.
    pub fn settings_count(&self) -> usize {
        self.state.lock().expect("state lock").settings.len()
    }

    /// The stored settings objects (clones).
    pub fn settings_objects(&self) -> Vec<serde_json::Value> {
        self.state.lock().expect("state lock").settings.clone()
    }

    /// Seed a classic object directly (for download tests).
    pub fn seed_classic(&self, collection: &str, id: &str, body: serde_json::Value) {
        let mut state = self.state.lock().expect("state lock");
        state
            .classic
            .entry(collection.to_string())
            .or_default()
            .push(StoredObject {
                id: id.to_string(),
                body,
            });
    }

    fn fresh_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let path = path_of(&request.url);
        let mut state = self.state.lock().expect("state lock");
        state.requests.push((request.method, path.clone()));

        // SSO token endpoint.
        if path.contains("/sso/") || request.url.contains("sso.") {
            return ok_json(serde_json::json!({
                "access_token": "fake-bearer",
                "token_type": "Bearer",
                "expires_in": 300,
            }));
        }

        // Settings objects.
        if path == "/api/v2/settings/objects" {
            return match request.method {
                Method::Get => {
                    let schema = query_value(request, "schemaIds");
                    let items: Vec<serde_json::Value> = state
                        .settings
                        .iter()
                        .filter(|o| {
                            schema.as_deref().is_none_or(|s| {
                                o.get("schemaId").and_then(serde_json::Value::as_str)
                                    == Some(s)
                            })
                        })
                        .cloned()
                        .collect();
                    ok_json(serde_json::json!({ "items": items }))
                }
                Method::Post => {
                    let Some(body) = parse_body(request) else {
                        return status(400, "invalid body");
                    };
                    let Some(entries) = body.as_array() else {
                        return status(400, "expected array");
                    };
                    let mut results = Vec::new();
                    for entry in entries {
                        let external_id = entry
                            .get("externalId")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let existing_idx = state.settings.iter().position(|o| {
                            o.get("externalId").and_then(serde_json::Value::as_str)
                                == Some(external_id.as_str())
                        });
                        let object_id = match existing_idx {
                            Some(idx) => {
                                let id = state.settings[idx]["objectId"]
                                    .as_str()
                                    .unwrap_or_default()
                                    .to_string();
                                let mut updated = entry.clone();
                                updated["objectId"] = serde_json::json!(id);
                                state.settings[idx] = updated;
                                id
                            }
                            None => {
                                let id = Self::fresh_id(&mut state, "settings");
                                let mut stored = entry.clone();
                                stored["objectId"] = serde_json::json!(id);
                                state.settings.push(stored);
                                id
                            }
                        };
                        results.push(serde_json::json!({ "code": 200, "objectId": object_id }));
                    }
                    ok_json(serde_json::Value::Array(results))
                }
                _ => status(405, "method not allowed"),
            };
        }
        if let Some(object_id) = path.strip_prefix("/api/v2/settings/objects/") {
            let idx = state.settings.iter().position(|o| {
                o.get("objectId").and_then(serde_json::Value::as_str) == Some(object_id)
            });
            return match (request.method, idx) {
                (Method::Put, Some(idx)) => {
                    if let Some(body) = parse_body(request) {
                        let id = object_id.to_string();
                        let mut updated = body;
                        updated["objectId"] = serde_json::json!(id);
                        // Keep schemaId/scope from the stored object when the
                        // update body omits them.
                        for key in ["schemaId", "scope", "externalId"] {
                            if updated.get(key).is_none()
                                && let Some(v) = state.settings[idx].get(key)
                            {
                                updated[key] = v.clone();
                            }
                        }
                        state.settings[idx] = updated;
                    }
                    ok_json(serde_json::json!({}))
                }
                (Method::Delete, Some(idx)) => {
                    state.settings.remove(idx);
                    status(204, "")
                }
                (Method::Get, Some(idx)) => ok_json(state.settings[idx].clone()),
                _ => status(404, "no such settings object"),
            };
        }
        if path == "/api/v2/settings/schemas" {
            let mut schemas: Vec<&str> = state
                .settings
                .iter()
                .filter_map(|o| o.get("schemaId").and_then(serde_json::Value::as_str))
                .collect();
            schemas.sort_unstable();
            schemas.dedup();
            let items: Vec<serde_json::Value> = schemas
                .iter()
                .map(|s| serde_json::json!({ "schemaId": s }))
                .collect();
            return ok_json(serde_json::json!({ "items": items }));
        }

        // Automation collections.
        if let Some(rest) = path.strip_prefix("/platform/automation/v1/") {
            let (collection, object_id) = match rest.split_once('/') {
                Some((c, id)) => (c.to_string(), Some(id.to_string())),
                None => (rest.to_string(), None),
            };
            if request.method == Method::Post && object_id.is_none() {
                let Some(body) = parse_body(request) else {
                    return status(400, "invalid body");
                };
                let id = body
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .map_or_else(|| Self::fresh_id(&mut state, "wf"), ToString::to_string);
                state
                    .automation
                    .entry(collection)
                    .or_default()
                    .insert(id.clone(), body);
                return ok_json(serde_json::json!({ "id": id }));
            }
            let objects = state.automation.entry(collection).or_default();
            return match (request.method, object_id) {
                (Method::Get, None) => {
                    let items: Vec<serde_json::Value> = objects.values().cloned().collect();
                    ok_json(serde_json::json!({ "items": items }))
                }
                (Method::Put, Some(id)) => {
                    if objects.contains_key(&id) {
                        if let Some(body) = parse_body(request) {
                            objects.insert(id, body);
                        }
                        ok_json(serde_json::json!({}))
                    } else {
                        status(404, "no such automation object")
                    }
                }
                (Method::Delete, Some(id)) => {
                    if objects.remove(&id).is_some() {
                        status(204, "")
                    } else {
                        status(404, "no such automation object")
                    }
                }
                _ => status(405, "method not allowed"),
            };
        }

        // Classic collections: exact path = collection, otherwise object.
        let (collection, object_id) = split_classic_path(&state, &path);
        match (request.method, object_id) {
            (Method::Get, None) => {
                let items: Vec<serde_json::Value> = state
                    .classic
                    .get(&collection)
                    .map(|objects| {
                        objects
                            .iter()
                            .map(|o| {
                                serde_json::json!({
                                    "id": o.id,
                                    "name": o.body.get("name").cloned()
                                        .unwrap_or(serde_json::json!("unnamed")),
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                ok_json(serde_json::json!({ "values": items }))
            }
            (Method::Post, None) => {
                let Some(body) = parse_body(request) else {
                    return status(400, "invalid body");
                };
                let id = Self::fresh_id(&mut state, "obj");
                state
                    .classic
                    .entry(collection)
                    .or_default()
                    .push(StoredObject {
                        id: id.clone(),
                        body,
                    });
                ok_json(serde_json::json!({ "id": id }))
            }
            (Method::Get, Some(id)) => {
                let found = state
                    .classic
                    .get(&collection)
                    .and_then(|objects| objects.iter().find(|o| o.id == id));
                match found {
                    Some(object) => {
                        let mut body = object.body.clone();
                        body["id"] = serde_json::json!(object.id);
                        ok_json(body)
                    }
                    None => status(404, "no such object"),
                }
            }
            (Method::Put, Some(id)) => {
                let Some(body) = parse_body(request) else {
                    return status(400, "invalid body");
                };
                let objects = state.classic.entry(collection).or_default();
                match objects.iter_mut().find(|o| o.id == id) {
                    Some(object) => {
                        object.body = body;
                        status(204, "")
                    }
                    // Classic PUT with a fresh id creates the object.
                    None => {
                        objects.push(StoredObject { id, body });
                        status(201, "")
                    }
                }
            }
            (Method::Delete, Some(id)) => {
                let objects = state.classic.entry(collection).or_default();
                let before = objects.len();
                objects.retain(|o| o.id != id);
                if objects.len() < before {
                    status(204, "")
                } else {
                    status(404, "no such object")
                }
            }
            _ => status(405, "method not allowed"),
        }
    }
}

impl HttpTransport for FakePlatform {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        Ok(self.route(request))
    }
}

fn path_of(url: &str) -> String {
    // "https://host/rest/of/path" → "/rest/of/path"
    let after_scheme = url.split("://").nth(1).unwrap_or(url);
    match after_scheme.find('/') {
        Some(idx) => after_scheme[idx..].to_string(),
        None => "/".to_string(),
    }
}

/// Split a classic path into collection and optional object id.
///
/// The longest known collection (one that already has objects) wins;
/// otherwise the last path segment is treated as the object id when the
/// remainder is a plausible collection.
fn split_classic_path(state: &State, path: &str) -> (String, Option<String>) {
    if state.classic.contains_key(path) {
        return (path.to_string(), None);
    }
    if let Some((collection, id)) = path.rsplit_once('/')
        && state.classic.contains_key(collection)
    {
        return (collection.to_string(), Some(id.to_string()));
    }
    // Unknown collection: heuristically treat trailing segments that look
    // like generated ids as object ids.
    if let Some((collection, id)) = path.rsplit_once('/')
        && (id.contains('-') || id.chars().all(|c| c.is_ascii_digit()))
        && collection.contains("/v1/")
    {
        return (collection.to_string(), Some(id.to_string()));
    }
    (path.to_string(), None)
}

fn query_value(request: &HttpRequest, key: &str) -> Option<String> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

fn parse_body(request: &HttpRequest) -> Option<serde_json::Value> {
    request
        .body
        .as_deref()
        .and_then(|b| serde_json::from_str(b).ok())
}

fn ok_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: value.to_string(),
    }
}

fn status(code: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status: code,
        body: body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Build an environment definition pointing at the fake platform.
pub fn environment(name: &str, with_platform: bool) -> EnvironmentDefinition {
    let token = Secret::new("TEST_TOKEN", "test-token-value");
    let auth = if with_platform {
        Auth::Platform {
            token,
            o_auth: OAuthCredentials {
                client_id: Secret::new("TEST_CID", "cid"),
                client_secret: Secret::new("TEST_CS", "cs"),
                token_endpoint: Some("https://sso.test/sso/oauth2/token".to_string()),
            },
        }
    } else {
        Auth::Token(token)
    };
    EnvironmentDefinition {
        name: name.to_string(),
        group: "default".to_string(),
        url: format!("https://{name}.test"),
        auth,
    }
}

/// A manifest over existing project directories and environments.
pub fn manifest_for(
    projects: &[(&str, &Path)],
    environments: &[EnvironmentDefinition],
) -> Manifest {
    let mut manifest = Manifest::default();
    for (name, path) in projects {
        manifest.projects.insert(
            (*name).to_string(),
            ProjectDefinition {
                name: (*name).to_string(),
                path: path.to_path_buf(),
            },
        );
    }
    for environment in environments {
        manifest
            .environments
            .insert(environment.name.clone(), environment.clone());
    }
    manifest
}

/// An isolated project directory backed by a `tempfile::TempDir`.
pub struct ProjectFixture {
    pub dir: tempfile::TempDir,
}

impl ProjectFixture {
    /// Create a project directory from `(relative path, content)` pairs.
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create parent dirs");
            }
            std::fs::write(&path, content).expect("write fixture file");
        }
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Write a manifest YAML file next to project fixtures, returning its path.
pub fn write_manifest_file(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("manifest.yaml");
    std::fs::write(&path, content).expect("write manifest file");
    path
}
