//! Persisting a downloaded project: config files, templates, manifest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::manifest::EnvironmentDefinition;
use crate::model::{Config, ConfigType, Parameter};
use crate::project::file::{ConfigDefinition, ConfigEntry, ConfigFile};

use super::DownloadedProject;

/// Write a downloaded project to `output_root`.
///
/// Produces one directory per kind with a `config.yaml` plus the template
/// files, and a `manifest.yaml` at the root so the folder can be deployed
/// as-is. Returns the manifest path.
///
/// # Errors
///
/// Fails on filesystem errors or unserializable configs.
pub fn write_project(
    output_root: &Path,
    project: &DownloadedProject,
    environment: &EnvironmentDefinition,
) -> Result<PathBuf> {
    let project_dir = output_root.join(&project.name);
    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("creating {}", project_dir.display()))?;

    // Group configs by kind, preserving download order.
    let mut by_kind: BTreeMap<String, Vec<&Config>> = BTreeMap::new();
    for config in &project.configs {
        by_kind
            .entry(config.coordinate.kind.clone())
            .or_default()
            .push(config);
    }

    for (kind, configs) in &by_kind {
        let kind_dir = project_dir.join(super::sanitize_id(kind));
        std::fs::create_dir_all(&kind_dir)
            .with_context(|| format!("creating {}", kind_dir.display()))?;

        let entries = configs
            .iter()
            .map(|config| config_entry(config))
            .collect::<Result<Vec<_>>>()?;
        let file = ConfigFile { configs: entries };
        let yaml = serde_yaml::to_string(&file).context("serializing config file")?;
        std::fs::write(kind_dir.join("config.yaml"), yaml)
            .with_context(|| format!("writing {}/config.yaml", kind_dir.display()))?;

        for config in configs {
            std::fs::write(kind_dir.join(&config.template.name), &config.template.content)
                .with_context(|| {
                    format!("writing template {}", config.template.name)
                })?;
        }
    }

    let manifest_path = output_root.join("manifest.yaml");
    let manifest = manifest_document(&project.name, environment);
    let yaml = serde_yaml::to_string(&manifest).context("serializing manifest")?;
    std::fs::write(&manifest_path, yaml)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    Ok(manifest_path)
}

fn config_entry(config: &Config) -> Result<ConfigEntry> {
    Ok(ConfigEntry {
        id: config.coordinate.id.clone(),
        config: ConfigDefinition {
            name: Some(parameter_yaml(&config.name)?),
            template: Some(config.template.name.clone()),
            skip: None,
            parameters: BTreeMap::new(),
            origin_object_id: config.origin_object_id.clone(),
        },
        type_: type_yaml(&config.type_)?,
        group_overrides: Vec::new(),
        environment_overrides: Vec::new(),
    })
}

/// Serialize a synthesized parameter back to its YAML shorthand.
///
/// Downloads only synthesize plain value parameters; anything else would be
/// a programming error upstream.
fn parameter_yaml(parameter: &Parameter) -> Result<serde_yaml::Value> {
    match parameter {
        Parameter::Value(value) => {
            serde_yaml::to_value(value).context("serializing parameter value")
        }
        other => anyhow::bail!("downloaded configs only carry value parameters, found {other:?}"),
    }
}

fn type_yaml(type_: &ConfigType) -> Result<serde_yaml::Value> {
    let json = match type_ {
        ConfigType::ClassicApi { api, .. } => serde_json::json!({ "api": api }),
        ConfigType::Settings {
            schema_id,
            schema_version,
            scope,
        } => {
            let scope = match scope {
                Parameter::Value(v) => v.clone(),
                other => anyhow::bail!("downloaded settings scope must be a value, found {other:?}"),
            };
            let mut settings = serde_json::json!({ "schema": schema_id, "scope": scope });
            if let (Some(version), Some(map)) = (schema_version, settings.as_object_mut()) {
                map.insert("schemaVersion".to_string(), serde_json::json!(version));
            }
            serde_json::json!({ "settings": settings })
        }
        ConfigType::Automation { resource } => {
            serde_json::json!({ "automation": { "resource": resource.as_str() } })
        }
        ConfigType::Bucket => serde_json::json!("bucket"),
        ConfigType::Document { kind, private } => {
            serde_json::json!({ "document": { "kind": kind.as_str(), "private": private } })
        }
        ConfigType::Segment => serde_json::json!("segment"),
    };
    serde_yaml::to_value(&json).context("serializing type block")
}

/// The minimal manifest describing the downloaded project and its source
/// environment. Secrets are written as variable names only.
fn manifest_document(
    project_name: &str,
    environment: &EnvironmentDefinition,
) -> serde_json::Value {
    serde_json::json!({
        "manifestVersion": "1.0",
        "projects": [{ "name": project_name }],
        "environmentGroups": [{
            "name": environment.group,
            "environments": [{
                "name": environment.name,
                "url": { "value": environment.url },
                "auth": { "token": { "name": environment.auth.token().name } },
            }],
        }],
    })
}
