//! The delete pipeline: delete plans, the deleter, and the purger.
//!
//! A delete plan names targets per kind; targets are resolved against the
//! live listing and removed one by one. No dependency order is needed —
//! entries are only grouped by kind. Missing targets are informational, and
//! platform-only kinds on environments without platform credentials produce
//! a warning instead of failing the environment.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Deserialize;

use crate::api::{self, ApiSpec};
use crate::client::ClientSet;
use crate::logging::Log;
use crate::model::{AutomationResource, Coordinate};

/// How one delete target is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    /// Match by object name.
    Name(String),
    /// Delete a known object id directly.
    ObjectId(String),
    /// Match by the externalId derived from `(project, kind, id)`.
    Coordinate {
        /// Project component of the coordinate.
        project: String,
        /// Config id component of the coordinate.
        id: String,
    },
}

/// One target of a delete plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePointer {
    /// Kind the target belongs to (API id, schema id, platform kind).
    pub kind: String,
    /// The identifying information.
    pub target: PointerTarget,
}

/// A parsed delete plan: pointers grouped by kind.
#[derive(Debug, Default)]
pub struct DeletePlan {
    /// Kind → targets, in file order.
    pub entries: BTreeMap<String, Vec<DeletePointer>>,
}

impl DeletePlan {
    /// Total number of targets across kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// `true` when the plan has no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteFile {
    delete: Vec<DeleteEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeleteEntry {
    /// `"kind/name"` shorthand.
    Shorthand(String),
    /// Structured entry with exactly one way to identify the target.
    Structured {
        #[serde(rename = "type")]
        type_: String,
        name: Option<String>,
        id: Option<String>,
        project: Option<String>,
    },
}

/// Load a delete plan from a YAML file.
///
/// # Errors
///
/// Fails on unreadable files, YAML syntax errors, shorthand entries without
/// a `/`, and structured entries that identify their target zero or two
/// ways.
pub fn load_delete_file(path: &Path) -> Result<DeletePlan> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading delete file {}", path.display()))?;
    let file: DeleteFile = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing delete file {}", path.display()))?;

    let mut plan = DeletePlan::default();
    for entry in file.delete {
        let pointer = match entry {
            DeleteEntry::Shorthand(text) => {
                let (kind, name) = text.split_once('/').with_context(|| {
                    format!("delete entry '{text}' must look like 'type/name'")
                })?;
                DeletePointer {
                    kind: kind.to_string(),
                    target: PointerTarget::Name(name.to_string()),
                }
            }
            DeleteEntry::Structured {
                type_,
                name,
                id,
                project,
            } => {
                let target = match (name, id, project) {
                    (Some(name), None, None) => PointerTarget::Name(name),
                    (None, Some(id), None) => PointerTarget::ObjectId(id),
                    (None, Some(id), Some(project)) => PointerTarget::Coordinate { project, id },
                    _ => anyhow::bail!(
                        "delete entry for '{type_}' must set exactly one of \
                         name, id, or project+id"
                    ),
                };
                DeletePointer {
                    kind: type_,
                    target,
                }
            }
        };
        plan.entries
            .entry(pointer.kind.clone())
            .or_default()
            .push(pointer);
    }
    Ok(plan)
}

/// Counters for one delete or purge run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeleteStats {
    /// Objects actually removed.
    pub deleted: usize,
    /// Targets with no live match (informational).
    pub not_found: usize,
    /// Targets skipped (e.g. platform kinds without credentials).
    pub skipped: usize,
}

impl std::ops::AddAssign for DeleteStats {
    fn add_assign(&mut self, other: Self) {
        self.deleted += other.deleted;
        self.not_found += other.not_found;
        self.skipped += other.skipped;
    }
}

impl DeleteStats {
    /// Format the summary line.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} deleted, {} not found, {} skipped",
            self.deleted, self.not_found, self.skipped
        )
    }
}

/// The kind families the deleter dispatches on.
#[derive(Debug)]
enum KindClass {
    Classic(&'static ApiSpec),
    Automation(AutomationResource),
    Bucket,
    Document,
    Segment,
    /// Anything else is treated as a settings schema id.
    Settings,
}

impl KindClass {
    fn of(kind: &str) -> Self {
        if let Some(spec) = api::get(kind) {
            return Self::Classic(spec);
        }
        if let Some(resource) = AutomationResource::parse(kind) {
            return Self::Automation(resource);
        }
        match kind {
            "bucket" => Self::Bucket,
            "document" => Self::Document,
            "segment" => Self::Segment,
            _ => Self::Settings,
        }
    }

    /// `true` for kinds that exist only behind platform credentials.
    const fn platform_only(&self) -> bool {
        matches!(
            self,
            Self::Automation(_) | Self::Bucket | Self::Document | Self::Segment
        )
    }
}

/// Execute a delete plan against one environment.
///
/// Missing targets are logged at info level. Platform-only kinds without
/// platform credentials produce one warning per kind and are skipped.
///
/// # Errors
///
/// Fails on listing/delete request errors; not-found targets never fail.
pub fn delete_from_environment(
    plan: &DeletePlan,
    clients: &ClientSet,
    log: &dyn Log,
) -> Result<DeleteStats> {
    let mut stats = DeleteStats::default();
    for (kind, pointers) in &plan.entries {
        let class = KindClass::of(kind);
        if class.platform_only() && !clients.has_platform() {
            log.warn(&format!(
                "skipping {} '{kind}' targets: environment has no platform credentials",
                pointers.len()
            ));
            stats.skipped += pointers.len();
            continue;
        }
        stats += delete_kind(kind, &class, pointers, clients, log)?;
    }
    Ok(stats)
}

fn delete_kind(
    kind: &str,
    class: &KindClass,
    pointers: &[DeletePointer],
    clients: &ClientSet,
    log: &dyn Log,
) -> Result<DeleteStats> {
    let mut stats = DeleteStats::default();
    match class {
        KindClass::Classic(spec) => {
            if spec.has_scope() {
                log.warn(&format!(
                    "skipping {} '{kind}' targets: sub-path APIs cannot be deleted \
                     without their parent scope",
                    pointers.len()
                ));
                stats.skipped += pointers.len();
                return Ok(stats);
            }
            let live = clients.classic.list(spec, None)?;
            for pointer in pointers {
                match resolve_classic(pointer, &live) {
                    Some(id) => {
                        if clients.classic.delete(spec, None, &id)? {
                            log.info(&format!("deleted {kind} '{id}'"));
                            stats.deleted += 1;
                        } else {
                            stats.not_found += 1;
                        }
                    }
                    None => {
                        log.info(&format!("no {kind} object matches {pointer:?}"));
                        stats.not_found += 1;
                    }
                }
            }
        }
        KindClass::Settings => {
            let live = clients.settings.list(kind)?;
            for pointer in pointers {
                match resolve_settings(kind, pointer, &live) {
                    Some(object_id) => {
                        if clients.settings.delete(&object_id)? {
                            log.info(&format!("deleted settings object '{object_id}'"));
                            stats.deleted += 1;
                        } else {
                            stats.not_found += 1;
                        }
                    }
                    None => {
                        log.info(&format!("no {kind} object matches {pointer:?}"));
                        stats.not_found += 1;
                    }
                }
            }
        }
        KindClass::Automation(resource) => {
            let platform = clients
                .platform()
                .context("platform credentials disappeared mid-run")?;
            let live = platform.automation.list(*resource)?;
            for pointer in pointers {
                match resolve_platform(kind, pointer, &live) {
                    Some(id) => {
                        if platform.automation.delete(*resource, &id)? {
                            log.info(&format!("deleted {kind} '{id}'"));
                            stats.deleted += 1;
                        } else {
                            stats.not_found += 1;
                        }
                    }
                    None => {
                        log.info(&format!("no {kind} object matches {pointer:?}"));
                        stats.not_found += 1;
                    }
                }
            }
        }
        KindClass::Bucket => {
            let platform = clients
                .platform()
                .context("platform credentials disappeared mid-run")?;
            for pointer in pointers {
                let name = match &pointer.target {
                    PointerTarget::Name(n) | PointerTarget::ObjectId(n) => n.clone(),
                    PointerTarget::Coordinate { .. } => {
                        log.info(&format!("bucket targets need a name, got {pointer:?}"));
                        stats.not_found += 1;
                        continue;
                    }
                };
                if platform.buckets.delete(&name)? {
                    log.info(&format!("deleted bucket '{name}'"));
                    stats.deleted += 1;
                } else {
                    stats.not_found += 1;
                }
            }
        }
        KindClass::Document | KindClass::Segment => {
            let platform = clients
                .platform()
                .context("platform credentials disappeared mid-run")?;
            let live = match class {
                KindClass::Document => {
                    let mut all = platform.documents.list("dashboard")?;
                    all.extend(platform.documents.list("notebook")?);
                    all
                }
                _ => platform.segments.list()?,
            };
            for pointer in pointers {
                match resolve_platform(kind, pointer, &live) {
                    Some(id) => {
                        let deleted = match class {
                            KindClass::Document => platform.documents.delete(&id)?,
                            _ => platform.segments.delete(&id)?,
                        };
                        if deleted {
                            log.info(&format!("deleted {kind} '{id}'"));
                            stats.deleted += 1;
                        } else {
                            stats.not_found += 1;
                        }
                    }
                    None => {
                        log.info(&format!("no {kind} object matches {pointer:?}"));
                        stats.not_found += 1;
                    }
                }
            }
        }
    }
    Ok(stats)
}

/// Resolve a pointer against classic listings (id or name match).
fn resolve_classic(pointer: &DeletePointer, live: &[serde_json::Value]) -> Option<String> {
    match &pointer.target {
        PointerTarget::ObjectId(id) => Some(id.clone()),
        PointerTarget::Name(name) => find_by(live, "name", name),
        // Classic objects carry no externalId to match a coordinate against.
        PointerTarget::Coordinate { .. } => None,
    }
}

/// Resolve a pointer against settings listings (objectId or externalId).
fn resolve_settings(
    kind: &str,
    pointer: &DeletePointer,
    live: &[serde_json::Value],
) -> Option<String> {
    match &pointer.target {
        PointerTarget::ObjectId(id) => Some(id.clone()),
        PointerTarget::Coordinate { project, id } => {
            let external_id = Coordinate::new(project.clone(), kind, id.clone()).external_id();
            find_by(live, "externalId", &external_id)
        }
        // Settings objects have no name to match.
        PointerTarget::Name(_) => None,
    }
}

/// Resolve a pointer against platform listings (id, name/title, externalId).
fn resolve_platform(
    kind: &str,
    pointer: &DeletePointer,
    live: &[serde_json::Value],
) -> Option<String> {
    match &pointer.target {
        PointerTarget::ObjectId(id) => Some(id.clone()),
        PointerTarget::Name(name) => {
            find_by(live, "name", name).or_else(|| find_by(live, "title", name))
        }
        PointerTarget::Coordinate { project, id } => {
            let coordinate = Coordinate::new(project.clone(), kind, id.clone());
            find_by(live, "externalId", &coordinate.external_id())
                .or_else(|| find_by(live, "id", &coordinate.stable_uuid()))
        }
    }
}

fn find_by(live: &[serde_json::Value], field: &str, value: &str) -> Option<String> {
    live.iter()
        .find(|item| item.get(field).and_then(serde_json::Value::as_str) == Some(value))
        .and_then(crate::client::item_id)
}

/// Delete every object of every known kind (the destructive superset).
///
/// Classic singleton APIs cannot be deleted and are skipped; settings
/// schemas are discovered from the schema listing; platform kinds run only
/// when the environment has platform credentials.
///
/// # Errors
///
/// Fails on listing/delete request errors.
pub fn purge_environment(clients: &ClientSet, log: &dyn Log) -> Result<DeleteStats> {
    let mut stats = DeleteStats::default();

    for spec in api::KNOWN_APIS {
        // Singletons cannot be deleted, deprecated APIs alias another
        // endpoint, and sub-path APIs have no flat listing to purge.
        if spec.single_configuration || spec.deprecated_by.is_some() || spec.has_scope() {
            continue;
        }
        let live = clients.classic.list(spec, None)?;
        for item in &live {
            if let Some(id) = crate::client::item_id(item)
                && clients.classic.delete(spec, None, &id)?
            {
                stats.deleted += 1;
            }
        }
        if !live.is_empty() {
            log.info(&format!("purged {} '{}' objects", live.len(), spec.id));
        }
    }

    for schema in clients.settings.list_schema_ids()? {
        let live = clients.settings.list(&schema)?;
        let mut removed = 0usize;
        for item in &live {
            if let Some(id) = crate::client::item_id(item)
                && clients.settings.delete(&id)?
            {
                stats.deleted += 1;
                removed += 1;
            }
        }
        if removed > 0 {
            log.info(&format!("purged {removed} '{schema}' objects"));
        }
    }

    if let Some(platform) = clients.platform() {
        for resource in [
            AutomationResource::Workflow,
            AutomationResource::BusinessCalendar,
            AutomationResource::SchedulingRule,
        ] {
            for item in platform.automation.list(resource)? {
                if let Some(id) = crate::client::item_id(&item)
                    && platform.automation.delete(resource, &id)?
                {
                    stats.deleted += 1;
                }
            }
        }
        for item in platform.segments.list()? {
            if let Some(id) = crate::client::item_id(&item)
                && platform.segments.delete(&id)?
            {
                stats.deleted += 1;
            }
        }
    } else {
        log.warn("platform kinds not purged: environment has no platform credentials");
    }

    Ok(stats)
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
    use crate::cancel::CancelToken;
    use crate::client::transport::test_transport::MockTransport;
    use crate::logging::Logger;
    use crate::manifest::{Auth, EnvironmentDefinition, OAuthCredentials, Secret};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn write_plan(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("delete.yaml");
        std::fs::write(&path, content).expect("write delete file");
        (dir, path)
    }

    fn environment(with_platform: bool) -> EnvironmentDefinition {
        let token = Secret::new("T", "tok");
        let auth = if with_platform {
            Auth::Platform {
                token,
                o_auth: OAuthCredentials {
                    client_id: Secret::new("CID", "id"),
                    client_secret: Secret::new("CS", "secret"),
                    token_endpoint: Some("https://sso.test/token".to_string()),
                },
            }
        } else {
            Auth::Token(token)
        };
        EnvironmentDefinition {
            name: "dev".to_string(),
            group: "default".to_string(),
            url: "https://dev.example.com".to_string(),
            auth,
        }
    }

    fn clients(mock: &Arc<MockTransport>, with_platform: bool) -> ClientSet {
        ClientSet::for_environment(
            &environment(with_platform),
            Arc::clone(mock) as Arc<dyn crate::client::transport::HttpTransport>,
            CancelToken::new(),
        )
    }

    // -----------------------------------------------------------------------
    // Plan loading
    // -----------------------------------------------------------------------

    #[test]
    fn loads_shorthand_and_structured_entries() {
        let (_dir, path) = write_plan(
            r#"
delete:
  - "management-zone/my zone"
  - type: workflow
    name: nightly
  - type: auto-tag
    id: tag-1
  - type: "builtin:alerting.profile"
    project: infra
    id: on-call
"#,
        );
        let plan = load_delete_file(&path).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(
            plan.entries["management-zone"][0].target,
            PointerTarget::Name("my zone".to_string())
        );
        assert_eq!(
            plan.entries["auto-tag"][0].target,
            PointerTarget::ObjectId("tag-1".to_string())
        );
        assert_eq!(
            plan.entries["builtin:alerting.profile"][0].target,
            PointerTarget::Coordinate {
                project: "infra".to_string(),
                id: "on-call".to_string()
            }
        );
    }

    #[test]
    fn shorthand_without_slash_is_rejected() {
        let (_dir, path) = write_plan("delete:\n  - \"just-a-name\"\n");
        assert!(load_delete_file(&path).is_err());
    }

    #[test]
    fn structured_entry_with_name_and_id_is_rejected() {
        let (_dir, path) = write_plan("delete:\n  - type: auto-tag\n    name: a\n    id: b\n");
        let err = load_delete_file(&path).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    // -----------------------------------------------------------------------
    // Deleter
    // -----------------------------------------------------------------------

    fn plan_with(kind: &str, target: PointerTarget) -> DeletePlan {
        let mut plan = DeletePlan::default();
        plan.entries.entry(kind.to_string()).or_default().push(DeletePointer {
            kind: kind.to_string(),
            target,
        });
        plan
    }

    #[test]
    fn classic_delete_by_name_resolves_against_listing() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": [{"id": "zone-9", "name": "my zone"}]}"#),
            (204, ""),
        ]));
        let set = clients(&mock, false);
        let log = Logger::new("test");
        let plan = plan_with("management-zone", PointerTarget::Name("my zone".to_string()));
        let stats = delete_from_environment(&plan, &set, &log).unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(mock.requests()[1].url.ends_with("/managementZones/zone-9"));
    }

    #[test]
    fn missing_target_is_not_an_error() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, r#"{"values": []}"#)]));
        let set = clients(&mock, false);
        let log = Logger::new("test");
        let plan = plan_with("management-zone", PointerTarget::Name("gone".to_string()));
        let stats = delete_from_environment(&plan, &set, &log).unwrap();
        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.not_found, 1);
    }

    #[test]
    fn platform_kind_without_credentials_warns_and_skips() {
        let mock = Arc::new(MockTransport::new());
        let set = clients(&mock, false);
        let log = Logger::new("test");
        let plan = plan_with("workflow", PointerTarget::Name("nightly".to_string()));
        let stats = delete_from_environment(&plan, &set, &log).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(mock.request_count(), 0, "no request without credentials");
    }

    #[test]
    fn settings_delete_by_coordinate_matches_external_id() {
        let schema = "builtin:alerting.profile";
        let external_id =
            Coordinate::new("infra", schema, "on-call").external_id();
        let listing = format!(
            r#"{{"items": [{{"objectId": "obj-3", "externalId": "{external_id}"}}]}}"#
        );
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, listing.as_str()),
            (204, ""),
        ]));
        let set = clients(&mock, false);
        let log = Logger::new("test");
        let plan = plan_with(
            schema,
            PointerTarget::Coordinate {
                project: "infra".to_string(),
                id: "on-call".to_string(),
            },
        );
        let stats = delete_from_environment(&plan, &set, &log).unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(mock.requests()[1].url.ends_with("/settings/objects/obj-3"));
    }

    #[test]
    fn stats_summary_format() {
        let stats = DeleteStats {
            deleted: 2,
            not_found: 1,
            skipped: 3,
        };
        assert_eq!(stats.summary(), "2 deleted, 1 not found, 3 skipped");
    }
}
