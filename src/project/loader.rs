//! Walks project directories and composes per-environment configs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::api;
use crate::error::ProjectError;
use crate::manifest::Manifest;
use crate::model::{
    AutomationResource, Config, ConfigType, Coordinate, DocumentKind, Parameter,
    RESERVED_PARAMETER_NAMES, Template,
};

use super::file::{ConfigEntry, ConfigFile, is_legacy_v1};

/// A loaded project: configs per environment, grouped by kind.
#[derive(Debug, Default)]
pub struct Project {
    /// Project id from the manifest.
    pub id: String,
    /// Environment name → kind → configs in declaration order.
    pub configs_per_environment: BTreeMap<String, BTreeMap<String, Vec<Config>>>,
}

impl Project {
    /// All configs composed for one environment, flattened in kind order.
    #[must_use]
    pub fn configs_for(&self, environment: &str) -> Vec<Config> {
        self.configs_per_environment
            .get(environment)
            .map(|kinds| kinds.values().flatten().cloned().collect())
            .unwrap_or_default()
    }
}

/// Load every project declared by the manifest.
///
/// Walks each project path, parses every YAML file as a config file, and
/// composes the effective config for each manifest environment by layering
/// environment override over group override over base.
///
/// # Errors
///
/// Fails on the first structural or validation problem: unreadable files,
/// legacy v1 layouts, unknown APIs or type blocks, reserved parameter names,
/// unresolvable skips, missing templates, missing stable identities for
/// non-unique-name APIs, and duplicate coordinates.
pub fn load_projects(manifest: &Manifest) -> Result<BTreeMap<String, Project>, ProjectError> {
    let mut projects = BTreeMap::new();
    for definition in manifest.projects.values() {
        let mut project = Project {
            id: definition.name.clone(),
            configs_per_environment: BTreeMap::new(),
        };
        let mut seen: BTreeSet<(String, Coordinate)> = BTreeSet::new();

        for file_path in yaml_files(&definition.path)? {
            let entries = parse_config_file(&file_path)?;
            for entry in &entries.configs {
                let parsed_type = parse_type(&entry.id, &file_path, &entry.type_)?;
                for environment in manifest.environments.values() {
                    let config = compose_config(
                        &definition.name,
                        &file_path,
                        entry,
                        &parsed_type,
                        &environment.name,
                        &environment.group,
                    )?;
                    let key = (environment.name.clone(), config.coordinate.clone());
                    if !seen.insert(key) {
                        return Err(ProjectError::DuplicateUid {
                            coordinate: config.coordinate,
                        });
                    }
                    project
                        .configs_per_environment
                        .entry(environment.name.clone())
                        .or_default()
                        .entry(config.coordinate.kind.clone())
                        .or_default()
                        .push(config);
                }
            }
        }
        projects.insert(definition.name.clone(), project);
    }
    Ok(projects)
}

/// Collect YAML files under `root` recursively, sorted for determinism.
///
/// Hidden files and directories (leading dot) are skipped.
fn yaml_files(root: &Path) -> Result<Vec<PathBuf>, ProjectError> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .map(|e| e.map(|entry| entry.path()))
            .collect::<Result<_, _>>()?;
        entries.sort();
        for path in entries {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                continue;
            }
            if path.is_dir() {
                walk(&path, out)?;
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yaml" || e == "yml")
            {
                out.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(root, &mut files).map_err(|source| ProjectError::Io {
        path: root.display().to_string(),
        source,
    })?;
    Ok(files)
}

fn parse_config_file(path: &Path) -> Result<ConfigFile, ProjectError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProjectError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let document: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| ProjectError::InvalidSyntax {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;
    if is_legacy_v1(&document) {
        return Err(ProjectError::LegacyV1Detected {
            file: path.display().to_string(),
        });
    }

    // Re-parse from the source text so serde errors keep line/column info.
    serde_yaml::from_str(&content).map_err(|e| ProjectError::InvalidSyntax {
        file: path.display().to_string(),
        message: e.to_string(),
    })
}

/// The closed set of type-block discriminators.
const TYPE_KEYS: &[&str] = &[
    "api",
    "settings",
    "automation",
    "bucket",
    "document",
    "segment",
    "entities",
];

fn invalid_type(entry_id: &str, file: &Path, reason: impl Into<String>) -> ProjectError {
    ProjectError::InvalidType {
        id: entry_id.to_string(),
        file: file.display().to_string(),
        reason: reason.into(),
    }
}

/// Parse and validate a type block into a [`ConfigType`].
fn parse_type(
    entry_id: &str,
    file: &Path,
    value: &serde_yaml::Value,
) -> Result<ConfigType, ProjectError> {
    match value {
        serde_yaml::Value::String(s) => match s.as_str() {
            "bucket" => Ok(ConfigType::Bucket),
            "segment" => Ok(ConfigType::Segment),
            other => Err(invalid_type(
                entry_id,
                file,
                format!("unknown config type '{other}'"),
            )),
        },
        serde_yaml::Value::Mapping(map) => {
            let declared: Vec<&str> = TYPE_KEYS
                .iter()
                .copied()
                .filter(|key| map.contains_key(*key))
                .collect();
            let [key] = declared.as_slice() else {
                return Err(invalid_type(
                    entry_id,
                    file,
                    format!(
                        "the type block must declare exactly one of {}, found {}",
                        TYPE_KEYS.join(", "),
                        declared.len()
                    ),
                ));
            };
            let body = map.get(*key).unwrap_or(&serde_yaml::Value::Null);
            match *key {
                "api" => parse_classic_type(entry_id, file, body),
                "settings" => parse_settings_type(entry_id, file, body),
                "automation" => parse_automation_type(entry_id, file, body),
                "bucket" => Ok(ConfigType::Bucket),
                "document" => parse_document_type(entry_id, file, body),
                "segment" => Ok(ConfigType::Segment),
                _ => Err(invalid_type(
                    entry_id,
                    file,
                    "config type 'entities' is download-only and not supported",
                )),
            }
        }
        _ => Err(invalid_type(entry_id, file, "the type block must be a mapping")),
    }
}

fn parse_classic_type(
    entry_id: &str,
    file: &Path,
    body: &serde_yaml::Value,
) -> Result<ConfigType, ProjectError> {
    let (api_id, scope) = match body {
        serde_yaml::Value::String(api_id) => (api_id.clone(), None),
        serde_yaml::Value::Mapping(map) => {
            let api_id = map
                .get("name")
                .and_then(serde_yaml::Value::as_str)
                .ok_or_else(|| invalid_type(entry_id, file, "api blocks require a 'name'"))?
                .to_string();
            let scope = map
                .get("scope")
                .map(|v| {
                    Parameter::from_yaml(v).map_err(|reason| ProjectError::InvalidParameter {
                        id: entry_id.to_string(),
                        file: file.display().to_string(),
                        name: "scope".to_string(),
                        reason,
                    })
                })
                .transpose()?;
            (api_id, scope)
        }
        _ => {
            return Err(invalid_type(
                entry_id,
                file,
                "api must be a string or a {name, scope} mapping",
            ));
        }
    };

    let spec = api::get(&api_id).ok_or_else(|| ProjectError::UnknownApi {
        api: api_id.clone(),
        file: file.display().to_string(),
    })?;
    if let Some(replacement) = spec.deprecated_by {
        tracing::warn!("API '{api_id}' is deprecated; use '{replacement}' instead");
    }
    if spec.has_scope() && scope.is_none() {
        return Err(invalid_type(
            entry_id,
            file,
            format!("API '{api_id}' is scoped by a parent object and requires a 'scope'"),
        ));
    }
    Ok(ConfigType::ClassicApi { api: api_id, scope })
}

fn parse_settings_type(
    entry_id: &str,
    file: &Path,
    body: &serde_yaml::Value,
) -> Result<ConfigType, ProjectError> {
    let map = body
        .as_mapping()
        .ok_or_else(|| invalid_type(entry_id, file, "settings must be a mapping"))?;
    let schema_id = map
        .get("schema")
        .and_then(serde_yaml::Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid_type(entry_id, file, "settings blocks require a non-empty 'schema'"))?
        .to_string();
    let schema_version = map.get("schemaVersion").and_then(|v| match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let scope = map
        .get("scope")
        .ok_or_else(|| invalid_type(entry_id, file, "settings blocks require a 'scope'"))?;
    let scope = Parameter::from_yaml(scope).map_err(|reason| ProjectError::InvalidParameter {
        id: entry_id.to_string(),
        file: file.display().to_string(),
        name: "scope".to_string(),
        reason,
    })?;
    Ok(ConfigType::Settings {
        schema_id,
        schema_version,
        scope,
    })
}

fn parse_automation_type(
    entry_id: &str,
    file: &Path,
    body: &serde_yaml::Value,
) -> Result<ConfigType, ProjectError> {
    let resource = body
        .as_mapping()
        .and_then(|m| m.get("resource"))
        .and_then(serde_yaml::Value::as_str)
        .ok_or_else(|| invalid_type(entry_id, file, "automation blocks require a 'resource'"))?;
    let resource = AutomationResource::parse(resource).ok_or_else(|| {
        invalid_type(
            entry_id,
            file,
            format!(
                "unknown automation resource '{resource}'; \
                 expected workflow, business-calendar, or scheduling-rule"
            ),
        )
    })?;
    Ok(ConfigType::Automation { resource })
}

fn parse_document_type(
    entry_id: &str,
    file: &Path,
    body: &serde_yaml::Value,
) -> Result<ConfigType, ProjectError> {
    let map = body
        .as_mapping()
        .ok_or_else(|| invalid_type(entry_id, file, "document must be a mapping"))?;
    let kind = map
        .get("kind")
        .and_then(serde_yaml::Value::as_str)
        .ok_or_else(|| invalid_type(entry_id, file, "document blocks require a 'kind'"))?;
    let kind = DocumentKind::parse(kind).ok_or_else(|| {
        invalid_type(
            entry_id,
            file,
            format!("unknown document kind '{kind}'; expected dashboard or notebook"),
        )
    })?;
    let private = map
        .get("private")
        .and_then(serde_yaml::Value::as_bool)
        .unwrap_or(false);
    Ok(ConfigType::Document { kind, private })
}

/// Compose one effective [`Config`] for a `(entry, environment)` pair.
fn compose_config(
    project_id: &str,
    file_path: &Path,
    entry: &ConfigEntry,
    parsed_type: &ConfigType,
    environment: &str,
    group: &str,
) -> Result<Config, ProjectError> {
    let definition = entry.effective_definition(group, environment);
    let file = file_path.display().to_string();
    let coordinate = Coordinate::new(project_id, parsed_type.kind(), entry.id.clone());

    // Parameters: reserved names are engine-owned.
    let mut parameters = BTreeMap::new();
    for (name, value) in &definition.parameters {
        if RESERVED_PARAMETER_NAMES.contains(&name.as_str()) {
            return Err(ProjectError::ReservedParameter {
                name: name.clone(),
                coordinate,
            });
        }
        let parameter =
            Parameter::from_yaml(value).map_err(|reason| ProjectError::InvalidParameter {
                id: entry.id.clone(),
                file: file.clone(),
                name: name.clone(),
                reason,
            })?;
        parameters.insert(name.clone(), parameter);
    }

    let name_value = definition
        .name
        .as_ref()
        .ok_or_else(|| ProjectError::InvalidParameter {
            id: entry.id.clone(),
            file: file.clone(),
            name: "name".to_string(),
            reason: "config must declare a name".to_string(),
        })?;
    let name = Parameter::from_yaml(name_value).map_err(|reason| ProjectError::InvalidParameter {
        id: entry.id.clone(),
        file: file.clone(),
        name: "name".to_string(),
        reason,
    })?;

    let template = load_template(entry, &definition.template, file_path)?;
    let skip = resolve_skip(&coordinate, definition.skip.as_ref())?;

    let mut config = Config {
        coordinate,
        group: group.to_string(),
        environment: environment.to_string(),
        type_: parsed_type.clone(),
        name,
        parameters,
        template,
        references: Vec::new(),
        skip,
        origin_object_id: definition.origin_object_id,
    };
    config.references = config.collect_references();

    check_stable_identity(&config)?;
    Ok(config)
}

fn load_template(
    entry: &ConfigEntry,
    template: &Option<String>,
    file_path: &Path,
) -> Result<Template, ProjectError> {
    let file = file_path.display().to_string();
    let name = template.clone().ok_or_else(|| ProjectError::InvalidType {
        id: entry.id.clone(),
        file: file.clone(),
        reason: "config must declare a template".to_string(),
    })?;
    let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join(&name);
    if !path.is_file() {
        return Err(ProjectError::MissingTemplate {
            id: entry.id.clone(),
            file,
            template: name,
        });
    }
    let content = std::fs::read_to_string(&path).map_err(|source| ProjectError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Template { name, content })
}

/// Resolve the skip toggle at load time.
///
/// Only `value` and `environment` parameters are accepted, and the result
/// must be a boolean (or the strings `"true"`/`"false"`).
fn resolve_skip(
    coordinate: &Coordinate,
    skip: Option<&serde_yaml::Value>,
) -> Result<bool, ProjectError> {
    let Some(skip) = skip else {
        return Ok(false);
    };
    let invalid = |reason: String| ProjectError::InvalidSkip {
        coordinate: coordinate.clone(),
        reason,
    };
    let parameter = Parameter::from_yaml(skip).map_err(invalid)?;
    let value = parameter.resolve_static().map_err(invalid)?;
    Parameter::as_bool(&value)
        .ok_or_else(|| invalid(format!("resolved to non-boolean value {value}")))
}

/// Non-unique-name APIs need a stable identity at load time: either an
/// `originObjectId` or a parameter referencing another entity's id.
fn check_stable_identity(config: &Config) -> Result<(), ProjectError> {
    let ConfigType::ClassicApi { api, .. } = &config.type_ else {
        return Ok(());
    };
    let Some(spec) = api::get(api) else {
        return Ok(());
    };
    if !spec.non_unique_name || config.origin_object_id.is_some() {
        return Ok(());
    }
    let has_id_reference = config.parameters.values().any(|p| {
        matches!(p, Parameter::Reference(r) if r.property == crate::model::PROP_ID)
    });
    if has_id_reference {
        return Ok(());
    }
    Err(ProjectError::MissingStableIdentity {
        coordinate: config.coordinate.clone(),
        api: api.clone(),
    })
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
    use crate::manifest::{Auth, EnvironmentDefinition, ProjectDefinition, Secret};

    /// A manifest with one project rooted at `path` and two environments in
    /// different groups.
    fn manifest_for(path: &Path) -> Manifest {
        let mut manifest = Manifest::default();
        manifest.projects.insert(
            "infra".to_string(),
            ProjectDefinition {
                name: "infra".to_string(),
                path: path.to_path_buf(),
            },
        );
        for (name, group) in [("dev", "nonprod"), ("prod", "prodgroup")] {
            manifest.environments.insert(
                name.to_string(),
                EnvironmentDefinition {
                    name: name.to_string(),
                    group: group.to_string(),
                    url: format!("https://{name}.example.com"),
                    auth: Auth::Token(Secret::new("T", "token")),
                },
            );
        }
        manifest
    }

    fn write_project(files: &[(&str, &str)]) -> (tempfile::TempDir, Manifest) {
        let dir = tempfile::tempdir().expect("create temp dir");
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create parent dirs");
            }
            std::fs::write(&path, content).expect("write project file");
        }
        let manifest = manifest_for(dir.path());
        (dir, manifest)
    }

    const PROFILE_YAML: &str = r#"
configs:
  - id: on-call
    config:
      name: On call
      template: profile.json
    type:
      api: alerting-profile
"#;

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[test]
    fn loads_config_for_every_environment() {
        let (_dir, manifest) =
            write_project(&[("profile.yaml", PROFILE_YAML), ("profile.json", "{}")]);
        let projects = load_projects(&manifest).unwrap();
        let project = &projects["infra"];
        assert_eq!(project.configs_for("dev").len(), 1);
        assert_eq!(project.configs_for("prod").len(), 1);
        let config = &project.configs_for("dev")[0];
        assert_eq!(config.coordinate.to_string(), "infra:alerting-profile:on-call");
        assert_eq!(config.group, "nonprod");
        assert_eq!(config.template.content, "{}");
        assert!(!config.skip);
    }

    #[test]
    fn walks_subdirectories_and_skips_hidden_files() {
        let (_dir, manifest) = write_project(&[
            ("sub/profile.yaml", PROFILE_YAML),
            ("sub/profile.json", "{}"),
            (".hidden/ignored.yaml", "not yaml at all: ["),
        ]);
        let projects = load_projects(&manifest).unwrap();
        assert_eq!(projects["infra"].configs_for("dev").len(), 1);
    }

    #[test]
    fn environment_override_changes_name_per_environment() {
        let yaml = r#"
configs:
  - id: on-call
    config:
      name: Base
      template: profile.json
    type:
      api: alerting-profile
    environmentOverrides:
      - environment: prod
        override:
          name: Prod name
"#;
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("profile.json", "{}")]);
        let projects = load_projects(&manifest).unwrap();
        let dev = &projects["infra"].configs_for("dev")[0];
        let prod = &projects["infra"].configs_for("prod")[0];
        assert_eq!(dev.name, Parameter::Value(serde_json::json!("Base")));
        assert_eq!(prod.name, Parameter::Value(serde_json::json!("Prod name")));
    }

    #[test]
    fn group_override_applies_to_group_members() {
        let yaml = r#"
configs:
  - id: on-call
    config:
      name: Base
      template: profile.json
    type:
      api: alerting-profile
    groupOverrides:
      - group: prodgroup
        override:
          skip: true
"#;
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("profile.json", "{}")]);
        let projects = load_projects(&manifest).unwrap();
        assert!(!projects["infra"].configs_for("dev")[0].skip);
        assert!(projects["infra"].configs_for("prod")[0].skip);
    }

    #[test]
    fn references_are_collected_from_parameters() {
        let yaml = r#"
configs:
  - id: dash
    config:
      name: Dash
      template: t.json
      originObjectId: keep-1
      parameters:
        zoneId: ["infra", "management-zone", "main", "id"]
    type:
      api: dashboard
"#;
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let projects = load_projects(&manifest).unwrap();
        let config = &projects["infra"].configs_for("dev")[0];
        assert_eq!(
            config.references,
            vec![Coordinate::new("infra", "management-zone", "main")]
        );
    }

    #[test]
    fn settings_type_parses_with_scope() {
        let yaml = r#"
configs:
  - id: s1
    config:
      name: Settings
      template: t.json
    type:
      settings:
        schema: "builtin:alerting.profile"
        schemaVersion: "1.0"
        scope: environment
"#;
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let projects = load_projects(&manifest).unwrap();
        let config = &projects["infra"].configs_for("dev")[0];
        let ConfigType::Settings {
            schema_id,
            schema_version,
            scope,
        } = &config.type_
        else {
            panic!("expected settings type")
        };
        assert_eq!(schema_id, "builtin:alerting.profile");
        assert_eq!(schema_version.as_deref(), Some("1.0"));
        assert_eq!(scope, &Parameter::Value(serde_json::json!("environment")));
    }

    #[test]
    fn automation_bucket_document_segment_types_parse() {
        let yaml = r#"
configs:
  - id: wf
    config: {name: W, template: t.json}
    type:
      automation:
        resource: workflow
  - id: b
    config: {name: B, template: t.json}
    type: bucket
  - id: doc
    config: {name: D, template: t.json}
    type:
      document:
        kind: notebook
        private: true
  - id: seg
    config: {name: S, template: t.json}
    type:
      segment: {}
"#;
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let projects = load_projects(&manifest).unwrap();
        let configs = projects["infra"].configs_for("dev");
        assert_eq!(configs.len(), 4);
        let kinds: BTreeSet<String> =
            configs.iter().map(|c| c.coordinate.kind.clone()).collect();
        assert!(kinds.contains("workflow"));
        assert!(kinds.contains("bucket"));
        assert!(kinds.contains("document"));
        assert!(kinds.contains("segment"));
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn legacy_v1_file_is_rejected_without_parsing() {
        let yaml = "config:\n  - profile: profile.json\nalerting-profile:\n  - name: x\n";
        let (_dir, manifest) = write_project(&[("legacy.yaml", yaml)]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(matches!(err, ProjectError::LegacyV1Detected { .. }));
    }

    #[test]
    fn unknown_api_is_rejected() {
        let yaml = "configs:\n  - id: x\n    config: {name: n, template: t.json}\n    type: {api: nope}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(matches!(err, ProjectError::UnknownApi { api, .. } if api == "nope"));
    }

    #[test]
    fn reserved_parameter_names_are_rejected() {
        for reserved in ["id", "scope", "name"] {
            let yaml = format!(
                "configs:\n  - id: x\n    config:\n      name: n\n      template: t.json\n      parameters:\n        {reserved}: v\n    type: {{api: auto-tag}}\n"
            );
            let (_dir, manifest) = write_project(&[("p.yaml", &yaml), ("t.json", "{}")]);
            let err = load_projects(&manifest).unwrap_err();
            assert!(
                matches!(err, ProjectError::ReservedParameter { ref name, .. } if name == reserved),
                "expected reserved-parameter error for '{reserved}'"
            );
        }
    }

    #[test]
    fn duplicate_uid_within_project_is_rejected() {
        let yaml = r"
configs:
  - id: same
    config: {name: a, template: t.json}
    type: {api: auto-tag}
  - id: same
    config: {name: b, template: t.json}
    type: {api: auto-tag}
";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(
            matches!(err, ProjectError::DuplicateUid { ref coordinate } if coordinate.to_string() == "infra:auto-tag:same")
        );
    }

    #[test]
    fn duplicate_name_across_different_apis_is_accepted() {
        let yaml = r"
configs:
  - id: same
    config: {name: a, template: t.json}
    type: {api: auto-tag}
  - id: same2
    config: {name: a, template: t.json}
    type: {api: management-zone}
";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        assert!(load_projects(&manifest).is_ok());
    }

    #[test]
    fn missing_template_file_is_rejected() {
        let (_dir, manifest) = write_project(&[("p.yaml", PROFILE_YAML)]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(
            matches!(err, ProjectError::MissingTemplate { ref template, .. } if template == "profile.json")
        );
    }

    #[test]
    fn settings_without_scope_is_rejected() {
        let yaml = "configs:\n  - id: s\n    config: {name: n, template: t.json}\n    type:\n      settings:\n        schema: sch\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(err.to_string().contains("require a 'scope'"));
    }

    #[test]
    fn sub_path_api_without_scope_is_rejected() {
        let yaml = "configs:\n  - id: k\n    config: {name: n, template: t.json}\n    type: {api: key-user-actions-web}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(err.to_string().contains("requires a 'scope'"));
    }

    #[test]
    fn two_type_keys_are_rejected() {
        let yaml = "configs:\n  - id: x\n    config: {name: n, template: t.json}\n    type:\n      api: auto-tag\n      bucket: {}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn entities_type_is_rejected() {
        let yaml = "configs:\n  - id: x\n    config: {name: n, template: t.json}\n    type:\n      entities:\n        entitiesType: HOST\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(err.to_string().contains("download-only"));
    }

    #[test]
    fn unknown_automation_resource_is_rejected() {
        let yaml = "configs:\n  - id: x\n    config: {name: n, template: t.json}\n    type:\n      automation:\n        resource: pipeline\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(err.to_string().contains("unknown automation resource"));
    }

    // -----------------------------------------------------------------------
    // Skip semantics
    // -----------------------------------------------------------------------

    #[test]
    fn skip_true_marks_config_skipped() {
        let yaml = "configs:\n  - id: x\n    config: {name: n, template: t.json, skip: true}\n    type: {api: auto-tag}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let projects = load_projects(&manifest).unwrap();
        assert!(projects["infra"].configs_for("dev")[0].skip);
    }

    #[test]
    fn skip_string_boolean_is_accepted() {
        let yaml = "configs:\n  - id: x\n    config: {name: n, template: t.json, skip: 'true'}\n    type: {api: auto-tag}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let projects = load_projects(&manifest).unwrap();
        assert!(projects["infra"].configs_for("dev")[0].skip);
    }

    #[test]
    fn skip_with_reference_parameter_is_rejected() {
        let yaml = "configs:\n  - id: x\n    config:\n      name: n\n      template: t.json\n      skip: [\"other\", \"id\"]\n    type: {api: auto-tag}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(matches!(err, ProjectError::InvalidSkip { .. }));
    }

    #[test]
    fn skip_resolving_to_non_boolean_is_rejected() {
        let yaml = "configs:\n  - id: x\n    config: {name: n, template: t.json, skip: maybe}\n    type: {api: auto-tag}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        let ProjectError::InvalidSkip { reason, .. } = err else {
            panic!("expected InvalidSkip")
        };
        assert!(reason.contains("non-boolean"));
    }

    // -----------------------------------------------------------------------
    // Stable identity for non-unique-name APIs
    // -----------------------------------------------------------------------

    #[test]
    fn non_unique_name_api_without_identity_is_rejected() {
        let yaml = "configs:\n  - id: d\n    config: {name: n, template: t.json}\n    type: {api: dashboard}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        let err = load_projects(&manifest).unwrap_err();
        assert!(matches!(err, ProjectError::MissingStableIdentity { .. }));
    }

    #[test]
    fn non_unique_name_api_with_origin_is_accepted() {
        let yaml = "configs:\n  - id: d\n    config: {name: n, template: t.json, originObjectId: o-1}\n    type: {api: dashboard}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        assert!(load_projects(&manifest).is_ok());
    }

    #[test]
    fn non_unique_name_api_with_id_reference_is_accepted() {
        let yaml = "configs:\n  - id: d\n    config:\n      name: n\n      template: t.json\n      parameters:\n        target: [\"management-zone\", \"z\", \"id\"]\n    type: {api: dashboard}\n";
        let (_dir, manifest) = write_project(&[("p.yaml", yaml), ("t.json", "{}")]);
        assert!(load_projects(&manifest).is_ok());
    }
}
