//! Config-file format: serde shapes and override layering.
//!
//! A config file holds a `configs:` list. Each entry carries a base
//! definition plus optional per-group and per-environment overrides; the
//! effective definition for an environment is composed by layering
//! environment override over group override over base.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level shape of a config file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// The config entries declared by this file.
    pub configs: Vec<ConfigEntry>,
}

/// One entry of the `configs:` list.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConfigEntry {
    /// Config id, unique within `(project, kind)`.
    pub id: String,
    /// The base definition.
    pub config: ConfigDefinition,
    /// The type block, parsed separately against the known kinds.
    #[serde(rename = "type")]
    pub type_: serde_yaml::Value,
    /// Per-group overrides, applied before environment overrides.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_overrides: Vec<GroupOverride>,
    /// Per-environment overrides, the strongest layer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_overrides: Vec<EnvironmentOverride>,
}

/// The overridable part of a config entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConfigDefinition {
    /// The name parameter (parameter-shaped: scalar or typed map).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<serde_yaml::Value>,
    /// Template file path, relative to the config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// The skip toggle (parameter-shaped, restricted kinds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<serde_yaml::Value>,
    /// User parameters by name (parameter-shaped values).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    /// Persistent external anchor on the platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_object_id: Option<String>,
}

/// A group override entry.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct GroupOverride {
    /// Group the override applies to.
    pub group: String,
    /// The overriding definition fragment.
    #[serde(rename = "override")]
    pub override_: ConfigDefinition,
}

/// An environment override entry.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct EnvironmentOverride {
    /// Environment the override applies to.
    pub environment: String,
    /// The overriding definition fragment.
    #[serde(rename = "override")]
    pub override_: ConfigDefinition,
}

impl ConfigDefinition {
    /// Overlay `other` onto this definition.
    ///
    /// Scalar fields replace when set in `other`; parameters merge key-wise
    /// with `other`'s entries winning.
    #[must_use]
    pub fn overlay(&self, other: &Self) -> Self {
        let mut parameters = self.parameters.clone();
        for (name, value) in &other.parameters {
            parameters.insert(name.clone(), value.clone());
        }
        Self {
            name: other.name.clone().or_else(|| self.name.clone()),
            template: other.template.clone().or_else(|| self.template.clone()),
            skip: other.skip.clone().or_else(|| self.skip.clone()),
            parameters,
            origin_object_id: other
                .origin_object_id
                .clone()
                .or_else(|| self.origin_object_id.clone()),
        }
    }
}

impl ConfigEntry {
    /// Compose the effective definition for one `(group, environment)` pair.
    ///
    /// Layering order: environment override over group override over base.
    #[must_use]
    pub fn effective_definition(&self, group: &str, environment: &str) -> ConfigDefinition {
        let mut effective = self.config.clone();
        if let Some(o) = self.group_overrides.iter().find(|o| o.group == group) {
            effective = effective.overlay(&o.override_);
        }
        if let Some(o) = self
            .environment_overrides
            .iter()
            .find(|o| o.environment == environment)
        {
            effective = effective.overlay(&o.override_);
        }
        effective
    }
}

/// Detect the legacy v1 layout: a top-level mapping with a `config` key.
///
/// Such files must not be parsed further; the caller reports a dedicated
/// migration error instead.
#[must_use]
pub fn is_legacy_v1(document: &serde_yaml::Value) -> bool {
    document
        .as_mapping()
        .is_some_and(|m| m.contains_key("config") && !m.contains_key("configs"))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse_file(yaml: &str) -> ConfigFile {
        serde_yaml::from_str(yaml).expect("valid config file")
    }

    const WITH_OVERRIDES: &str = r#"
configs:
  - id: profile
    config:
      name: Base name
      template: profile.json
      parameters:
        severity: LOW
        region: eu
    type:
      api: alerting-profile
    groupOverrides:
      - group: prod
        override:
          parameters:
            severity: HIGH
    environmentOverrides:
      - environment: prod-a
        override:
          name: Prod A name
          parameters:
            region: us
"#;

    // -----------------------------------------------------------------------
    // Layering
    // -----------------------------------------------------------------------

    #[test]
    fn base_definition_used_without_matching_overrides() {
        let file = parse_file(WITH_OVERRIDES);
        let effective = file.configs[0].effective_definition("dev-group", "dev");
        assert_eq!(
            effective.name,
            Some(serde_yaml::Value::String("Base name".to_string()))
        );
        assert_eq!(effective.parameters["severity"].as_str(), Some("LOW"));
    }

    #[test]
    fn group_override_replaces_parameter() {
        let file = parse_file(WITH_OVERRIDES);
        let effective = file.configs[0].effective_definition("prod", "prod-b");
        assert_eq!(effective.parameters["severity"].as_str(), Some("HIGH"));
        // Untouched parameters survive the overlay.
        assert_eq!(effective.parameters["region"].as_str(), Some("eu"));
    }

    #[test]
    fn environment_override_wins_over_group_override() {
        let file = parse_file(WITH_OVERRIDES);
        let effective = file.configs[0].effective_definition("prod", "prod-a");
        assert_eq!(
            effective.name,
            Some(serde_yaml::Value::String("Prod A name".to_string()))
        );
        assert_eq!(effective.parameters["severity"].as_str(), Some("HIGH"));
        assert_eq!(effective.parameters["region"].as_str(), Some("us"));
    }

    #[test]
    fn overlay_keeps_base_fields_when_override_is_silent() {
        let base = ConfigDefinition {
            name: Some(serde_yaml::Value::String("n".to_string())),
            template: Some("t.json".to_string()),
            skip: None,
            parameters: BTreeMap::new(),
            origin_object_id: Some("origin-1".to_string()),
        };
        let effective = base.overlay(&ConfigDefinition::default());
        assert_eq!(effective.template.as_deref(), Some("t.json"));
        assert_eq!(effective.origin_object_id.as_deref(), Some("origin-1"));
    }

    #[test]
    fn overlay_replaces_skip_and_origin() {
        let base = ConfigDefinition::default();
        let over = ConfigDefinition {
            skip: Some(serde_yaml::Value::Bool(true)),
            origin_object_id: Some("new".to_string()),
            ..ConfigDefinition::default()
        };
        let effective = base.overlay(&over);
        assert_eq!(effective.skip, Some(serde_yaml::Value::Bool(true)));
        assert_eq!(effective.origin_object_id.as_deref(), Some("new"));
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_entry_key_is_rejected() {
        let result: Result<ConfigFile, _> = serde_yaml::from_str(
            "configs:\n  - id: x\n    config: {name: n, template: t.json}\n    type: {api: auto-tag}\n    extra: 1\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn origin_object_id_parses() {
        let file = parse_file(
            "configs:\n  - id: x\n    config:\n      name: n\n      template: t.json\n      originObjectId: abc-123\n    type: {api: auto-tag}\n",
        );
        assert_eq!(
            file.configs[0].config.origin_object_id.as_deref(),
            Some("abc-123")
        );
    }

    // -----------------------------------------------------------------------
    // Legacy detection
    // -----------------------------------------------------------------------

    #[test]
    fn legacy_v1_shape_is_detected() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str("config:\n  - profile: profile.json\n").unwrap();
        assert!(is_legacy_v1(&doc));
    }

    #[test]
    fn v2_shape_is_not_legacy() {
        let doc: serde_yaml::Value = serde_yaml::from_str(WITH_OVERRIDES).unwrap();
        assert!(!is_legacy_v1(&doc));
    }

    #[test]
    fn non_mapping_is_not_legacy() {
        let doc: serde_yaml::Value = serde_yaml::from_str("- a\n- b\n").unwrap();
        assert!(!is_legacy_v1(&doc));
    }
}
