//! The download pipeline: reconstruct a project from a live environment.
//!
//! For each supported kind the live objects are listed, filtered by the
//! per-kind ownership heuristics, fetched, normalized, and converted into
//! configs with synthesized parameters: at least `name`, `scope` for
//! settings, and `originObjectId` anchored to the platform id. Templates are
//! in-memory copies of the normalized bodies; reference extraction from
//! downloaded bodies is best-effort and not attempted here.

mod writer;

pub use writer::write_project;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use anyhow::{Context as _, Result};
use regex::Regex;

use crate::api;
use crate::client::ClientSet;
use crate::logging::Log;
use crate::model::{
    AutomationResource, Config, ConfigType, Coordinate, DocumentKind, PROP_NAME, Parameter,
    Template,
};

/// What to download.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Project name the downloaded configs are filed under.
    pub project_name: String,
    /// Classic APIs to download; empty means every downloadable API.
    pub apis: Vec<String>,
    /// Settings schemas to download; empty means every schema on the
    /// environment (only consulted when `include_settings` is set).
    pub settings_schemas: Vec<String>,
    /// Download settings objects.
    pub include_settings: bool,
    /// Download platform kinds when the environment has OAuth credentials.
    pub include_platform: bool,
}

/// A reconstructed project ready for persistence.
#[derive(Debug, Default)]
pub struct DownloadedProject {
    /// Project name.
    pub name: String,
    /// Converted configs with in-memory templates.
    pub configs: Vec<Config>,
}

/// Per-API name patterns for objects the platform owns; those are never
/// downloaded as user configuration.
static OWNERSHIP_FILTERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("dashboard", r"^(Built-in|\[Read only\])"),
        ("alerting-profile", r"^Default$"),
        ("maintenance-window", r"^System maintenance"),
    ]
    .into_iter()
    .filter_map(|(api, pattern)| Regex::new(pattern).ok().map(|re| (api, re)))
    .collect()
});

/// `true` when the object's name marks it as platform-owned.
fn is_platform_owned(api_id: &str, name: &str) -> bool {
    OWNERSHIP_FILTERS
        .iter()
        .any(|(api, re)| *api == api_id && re.is_match(name))
}

/// Download the selected kinds from one environment into a project.
///
/// # Errors
///
/// Fails on listing/fetch errors; individual objects that cannot be
/// converted are skipped with a warning instead.
pub fn download_environment(
    clients: &ClientSet,
    options: &DownloadOptions,
    log: &dyn Log,
) -> Result<DownloadedProject> {
    let mut project = DownloadedProject {
        name: options.project_name.clone(),
        configs: Vec::new(),
    };

    download_classic(clients, options, log, &mut project)?;
    if options.include_settings {
        download_settings(clients, options, log, &mut project)?;
    }
    if options.include_platform {
        if clients.has_platform() {
            download_platform(clients, log, &mut project)?;
        } else {
            log.warn("platform kinds not downloaded: environment has no platform credentials");
        }
    }

    dedupe_config_ids(&mut project.configs);
    log.info(&format!(
        "downloaded {} configs into project '{}'",
        project.configs.len(),
        project.name
    ));
    Ok(project)
}

/// Make config ids unique per kind.
///
/// Sanitizing platform ids can collide (two objects mapping to the same
/// slug); collisions get a numeric suffix so the project loads without
/// duplicate-UID errors.
fn dedupe_config_ids(configs: &mut [Config]) {
    let mut seen: std::collections::BTreeSet<(String, String)> = std::collections::BTreeSet::new();
    for config in configs.iter_mut() {
        let kind = config.coordinate.kind.clone();
        let mut id = config.coordinate.id.clone();
        let mut counter = 1usize;
        while !seen.insert((kind.clone(), id.clone())) {
            counter += 1;
            id = format!("{}-{counter}", config.coordinate.id);
        }
        if id != config.coordinate.id {
            config.coordinate.id = id.clone();
            config.template.name = format!("{id}.json");
        }
    }
}

fn selected_apis(options: &DownloadOptions) -> Vec<&'static api::ApiSpec> {
    api::KNOWN_APIS
        .iter()
        .filter(|spec| {
            if options.apis.is_empty() {
                !spec.skip_download && spec.deprecated_by.is_none()
            } else {
                options.apis.iter().any(|a| a == spec.id)
            }
        })
        .collect()
}

fn download_classic(
    clients: &ClientSet,
    options: &DownloadOptions,
    log: &dyn Log,
    project: &mut DownloadedProject,
) -> Result<()> {
    for spec in selected_apis(options) {
        if spec.has_scope() {
            // Sub-path APIs need a parent object per listing; out of reach
            // for a flat environment download.
            continue;
        }
        if spec.single_configuration {
            let body = clients.classic.get(spec, None, "")?;
            let config = classic_config(options, spec, spec.id, spec.id, &body);
            project.configs.push(config);
            continue;
        }

        let listed = clients.classic.list(spec, None)?;
        log.debug(&format!("{}: {} live objects", spec.id, listed.len()));
        for item in listed {
            let Some(id) = crate::client::item_id(&item) else {
                log.warn(&format!("{}: listing entry without id skipped", spec.id));
                continue;
            };
            let name = item
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(&id)
                .to_string();
            if is_platform_owned(spec.id, &name) {
                log.debug(&format!("{}: '{name}' is platform-owned, skipped", spec.id));
                continue;
            }
            let body = clients.classic.get(spec, None, &id)?;
            let config = classic_config(options, spec, &id, &name, &body);
            project.configs.push(config);
        }
    }
    Ok(())
}

fn classic_config(
    options: &DownloadOptions,
    spec: &api::ApiSpec,
    object_id: &str,
    name: &str,
    body: &serde_json::Value,
) -> Config {
    let mut normalized = body.clone();
    if let Some(map) = normalized.as_object_mut() {
        map.remove("id");
        map.remove("metadata");
        // Templatize the name so re-deploys follow the config's name
        // parameter instead of the downloaded literal.
        if map.contains_key("name") {
            map.insert(
                "name".to_string(),
                serde_json::json!(format!("{{{{ {PROP_NAME} }}}}")),
            );
        }
    }
    let config_id = sanitize_id(object_id);
    build_config(
        &options.project_name,
        ConfigType::ClassicApi {
            api: spec.id.to_string(),
            scope: None,
        },
        &config_id,
        name,
        Some(object_id),
        &normalized,
    )
}

fn download_settings(
    clients: &ClientSet,
    options: &DownloadOptions,
    log: &dyn Log,
    project: &mut DownloadedProject,
) -> Result<()> {
    let schemas = if options.settings_schemas.is_empty() {
        clients.settings.list_schema_ids()?
    } else {
        options.settings_schemas.clone()
    };

    for schema in schemas {
        let objects = clients.settings.list_with_values(&schema)?;
        log.debug(&format!("{schema}: {} live objects", objects.len()));
        for item in objects {
            let Some(object_id) = crate::client::item_id(&item) else {
                continue;
            };
            let scope = item
                .get("scope")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("environment")
                .to_string();
            let value = item
                .get("value")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            let config_id = sanitize_id(&object_id);
            project.configs.push(build_config(
                &options.project_name,
                ConfigType::Settings {
                    schema_id: schema.clone(),
                    schema_version: None,
                    scope: Parameter::Value(serde_json::json!(scope)),
                },
                &config_id,
                &config_id,
                Some(&object_id),
                &value,
            ));
        }
    }
    Ok(())
}

fn download_platform(
    clients: &ClientSet,
    log: &dyn Log,
    project: &mut DownloadedProject,
) -> Result<()> {
    let platform = clients
        .platform()
        .context("platform credentials vanished mid-download")?;

    for resource in [
        AutomationResource::Workflow,
        AutomationResource::BusinessCalendar,
        AutomationResource::SchedulingRule,
    ] {
        for item in platform.automation.list(resource)? {
            let Some(id) = crate::client::item_id(&item) else {
                continue;
            };
            let name = item
                .get("title")
                .or_else(|| item.get("name"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or(&id)
                .to_string();
            let mut normalized = item.clone();
            if let Some(map) = normalized.as_object_mut() {
                map.remove("id");
            }
            project.configs.push(build_config(
                &project.name.clone(),
                ConfigType::Automation { resource },
                &sanitize_id(&id),
                &name,
                Some(&id),
                &normalized,
            ));
        }
    }

    for kind in [DocumentKind::Dashboard, DocumentKind::Notebook] {
        for item in platform.documents.list(kind.as_str())? {
            let Some(id) = crate::client::item_id(&item) else {
                continue;
            };
            let name = item
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(&id)
                .to_string();
            let private = item
                .get("isPrivate")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            let content = platform.documents.get_content(&id)?;
            project.configs.push(build_config(
                &project.name.clone(),
                ConfigType::Document { kind, private },
                &sanitize_id(&id),
                &name,
                Some(&id),
                &content,
            ));
        }
    }

    let segments = platform.segments.list()?;
    log.debug(&format!("segment: {} live objects", segments.len()));
    for item in segments {
        let Some(uid) = crate::client::item_id(&item) else {
            continue;
        };
        let name = item
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&uid)
            .to_string();
        let mut normalized = item.clone();
        if let Some(map) = normalized.as_object_mut() {
            map.remove("uid");
            map.remove("version");
        }
        project.configs.push(build_config(
            &project.name.clone(),
            ConfigType::Segment,
            &sanitize_id(&uid),
            &name,
            Some(&uid),
            &normalized,
        ));
    }

    Ok(())
}

/// Assemble a downloaded config with synthesized parameters.
fn build_config(
    project_name: &str,
    type_: ConfigType,
    config_id: &str,
    name: &str,
    origin_object_id: Option<&str>,
    body: &serde_json::Value,
) -> Config {
    let coordinate = Coordinate::new(project_name, type_.kind(), config_id);
    let content = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    Config {
        coordinate,
        group: String::new(),
        environment: String::new(),
        type_,
        name: Parameter::Value(serde_json::json!(name)),
        parameters: BTreeMap::new(),
        template: Template {
            name: format!("{config_id}.json"),
            content,
        },
        references: Vec::new(),
        skip: false,
        origin_object_id: origin_object_id.map(ToString::to_string),
    }
}

/// Turn a platform object id into a filesystem- and coordinate-friendly id.
fn sanitize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_dash = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-').to_string();
    if trimmed.is_empty() {
        "object".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::client::transport::test_transport::MockTransport;
    use crate::logging::Logger;
    use crate::manifest::{Auth, EnvironmentDefinition, Secret};
    use std::sync::Arc;

    fn environment() -> EnvironmentDefinition {
        EnvironmentDefinition {
            name: "dev".to_string(),
            group: "default".to_string(),
            url: "https://dev.example.com".to_string(),
            auth: Auth::Token(Secret::new("T", "tok")),
        }
    }

    fn clients(mock: &Arc<MockTransport>) -> ClientSet {
        ClientSet::for_environment(
            &environment(),
            Arc::clone(mock) as Arc<dyn crate::client::transport::HttpTransport>,
            CancelToken::new(),
        )
    }

    // -----------------------------------------------------------------------
    // sanitize_id
    // -----------------------------------------------------------------------

    #[test]
    fn sanitize_id_lowercases_and_dashes() {
        assert_eq!(sanitize_id("ZONE-1a"), "zone-1a");
        assert_eq!(sanitize_id("My Zone (prod)"), "my-zone-prod");
        assert_eq!(sanitize_id("--x--"), "x");
    }

    #[test]
    fn sanitize_id_never_returns_empty() {
        assert_eq!(sanitize_id("***"), "object");
        assert_eq!(sanitize_id(""), "object");
    }

    // -----------------------------------------------------------------------
    // ownership filters
    // -----------------------------------------------------------------------

    #[test]
    fn builtin_dashboards_are_platform_owned() {
        assert!(is_platform_owned("dashboard", "Built-in host health"));
        assert!(!is_platform_owned("dashboard", "Team overview"));
        assert!(!is_platform_owned("auto-tag", "Built-in whatever"));
    }

    // -----------------------------------------------------------------------
    // classic download
    // -----------------------------------------------------------------------

    fn options(apis: &[&str]) -> DownloadOptions {
        DownloadOptions {
            project_name: "downloaded".to_string(),
            apis: apis.iter().map(ToString::to_string).collect(),
            settings_schemas: vec![],
            include_settings: false,
            include_platform: false,
        }
    }

    #[test]
    fn downloads_classic_objects_with_origin_anchor() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": [{"id": "zone-1", "name": "My zone"}]}"#),
            (200, r#"{"id": "zone-1", "name": "My zone", "rules": []}"#),
        ]));
        let set = clients(&mock);
        let log = Logger::new("test");
        let project =
            download_environment(&set, &options(&["management-zone"]), &log).unwrap();
        assert_eq!(project.configs.len(), 1);
        let config = &project.configs[0];
        assert_eq!(config.coordinate.kind, "management-zone");
        assert_eq!(config.origin_object_id.as_deref(), Some("zone-1"));
        assert_eq!(config.name, Parameter::Value(serde_json::json!("My zone")));
        // The body was normalized: id dropped, name templatized.
        assert!(!config.template.content.contains("\"zone-1\""));
        assert!(config.template.content.contains("{{ name }}"));
    }

    #[test]
    fn platform_owned_objects_are_filtered() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            200,
            r#"{"values": [{"id": "d-1", "name": "Built-in overview"}]}"#,
        )]));
        let set = clients(&mock);
        let log = Logger::new("test");
        let project = download_environment(&set, &options(&["dashboard"]), &log).unwrap();
        assert!(project.configs.is_empty());
        // Only the listing request; the body was never fetched.
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn skip_download_apis_are_excluded_by_default() {
        let selected = selected_apis(&options(&[]));
        assert!(selected.iter().all(|s| !s.skip_download));
        assert!(selected.iter().all(|s| s.deprecated_by.is_none()));
    }

    #[test]
    fn explicit_api_selection_overrides_skip_download() {
        let selected = selected_apis(&options(&["extension"]));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "extension");
    }

    // -----------------------------------------------------------------------
    // id de-duplication
    // -----------------------------------------------------------------------

    #[test]
    fn colliding_ids_get_numeric_suffixes() {
        let make = |id: &str| {
            build_config(
                "p",
                ConfigType::ClassicApi {
                    api: "auto-tag".to_string(),
                    scope: None,
                },
                id,
                id,
                None,
                &serde_json::json!({}),
            )
        };
        let mut configs = vec![make("tag"), make("tag"), make("tag")];
        dedupe_config_ids(&mut configs);
        let ids: Vec<&str> = configs.iter().map(|c| c.coordinate.id.as_str()).collect();
        assert_eq!(ids, vec!["tag", "tag-2", "tag-3"]);
        assert_eq!(configs[1].template.name, "tag-2.json");
    }

    // -----------------------------------------------------------------------
    // settings download
    // -----------------------------------------------------------------------

    #[test]
    fn downloads_settings_objects_with_scope() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            200,
            r#"{"items": [{"objectId": "obj-1", "scope": "HOST-1", "value": {"enabled": true}}]}"#,
        )]));
        let set = clients(&mock);
        let log = Logger::new("test");
        let opts = DownloadOptions {
            project_name: "downloaded".to_string(),
            apis: vec!["none-selected".to_string()],
            settings_schemas: vec!["builtin:alerting.profile".to_string()],
            include_settings: true,
            include_platform: false,
        };
        let project = download_environment(&set, &opts, &log).unwrap();
        assert_eq!(project.configs.len(), 1);
        let config = &project.configs[0];
        let ConfigType::Settings { scope, .. } = &config.type_ else {
            panic!("expected settings config")
        };
        assert_eq!(scope, &Parameter::Value(serde_json::json!("HOST-1")));
        assert_eq!(config.origin_object_id.as_deref(), Some("obj-1"));
        assert!(config.template.content.contains("enabled"));
    }
}
