//! Parameter variants: values, environment lookups, references, lists, compounds.
//!
//! Parameters are a closed tagged union. A central constructor registry maps
//! the YAML `type:` discriminator to the matching variant, and two shorthands
//! are accepted: a plain scalar becomes a [`Parameter::Value`], and a sequence
//! of two to four scalars becomes a [`Parameter::Reference`]
//! (`[project, kind, id, property]`, with leading elements defaulting to the
//! current config's project and kind).

use std::collections::{BTreeMap, BTreeSet};

use super::Coordinate;
use super::entity::ResolutionContext;
use crate::error::ResolveError;

/// Parameter names written by the engine only; user declarations are rejected.
pub const RESERVED_PARAMETER_NAMES: &[&str] = &["id", "scope", "name"];

/// A reference to another config's deployed entity.
///
/// `project` and `kind` default to the referencing config's own coordinate
/// components when omitted (the shorthand forms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterReference {
    /// Target project; `None` means the referencing config's project.
    pub project: Option<String>,
    /// Target kind; `None` means the referencing config's kind.
    pub kind: Option<String>,
    /// Target config id.
    pub id: String,
    /// Property to extract from the resolved entity (e.g. `id`, `name`).
    pub property: String,
}

impl ParameterReference {
    /// The coordinate this reference points at, with defaults filled in
    /// from the referencing config's own coordinate.
    #[must_use]
    pub fn coordinate(&self, base: &Coordinate) -> Coordinate {
        Coordinate::new(
            self.project.clone().unwrap_or_else(|| base.project.clone()),
            self.kind.clone().unwrap_or_else(|| base.kind.clone()),
            self.id.clone(),
        )
    }
}

/// A config parameter, polymorphic over `{references, resolve}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// A literal scalar or structured value.
    Value(serde_json::Value),
    /// An environment-variable lookup with an optional default.
    Environment {
        /// The variable name.
        name: String,
        /// Value used when the variable is unset.
        default: Option<String>,
    },
    /// A lookup into another config's resolved entity.
    Reference(ParameterReference),
    /// An ordered sequence of parameters.
    List(Vec<Parameter>),
    /// A format string rendered from sibling parameters.
    Compound {
        /// The format string, referring to siblings as `{{ name }}`.
        format: String,
        /// Names of the sibling parameters the format consumes.
        parameter_names: Vec<String>,
    },
}

/// Constructor function for one `type:` discriminator.
type Constructor = fn(&serde_yaml::Mapping) -> Result<Parameter, String>;

/// The closed registry of parameter constructors, keyed by discriminator.
const CONSTRUCTORS: &[(&str, Constructor)] = &[
    ("value", parse_value),
    ("environment", parse_environment),
    ("reference", parse_reference),
    ("list", parse_list),
    ("compound", parse_compound),
];

impl Parameter {
    /// Construct a parameter from its YAML definition.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the definition is malformed:
    /// an unknown `type:`, a missing required field, or a shorthand sequence
    /// that is not two to four scalars.
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self, String> {
        match value {
            serde_yaml::Value::Mapping(map) => {
                let kind = map
                    .get("type")
                    .and_then(serde_yaml::Value::as_str)
                    .ok_or_else(|| "parameter maps must declare a 'type'".to_string())?;
                let constructor = CONSTRUCTORS
                    .iter()
                    .find(|(name, _)| *name == kind)
                    .map(|(_, f)| f)
                    .ok_or_else(|| format!("unknown parameter type '{kind}'"))?;
                constructor(map)
            }
            serde_yaml::Value::Sequence(items) => parse_reference_shorthand(items),
            scalar => Ok(Self::Value(yaml_to_json(scalar)?)),
        }
    }

    /// All coordinates this parameter (transitively) references.
    ///
    /// Compound parameters contribute the references of the siblings they
    /// name; `siblings` is the full parameter map of the owning config.
    /// The result is sorted and de-duplicated.
    #[must_use]
    pub fn references(
        &self,
        base: &Coordinate,
        siblings: &BTreeMap<String, Self>,
    ) -> Vec<Coordinate> {
        let mut out = Vec::new();
        let mut visited = BTreeSet::new();
        self.collect_references(base, siblings, &mut visited, &mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_references(
        &self,
        base: &Coordinate,
        siblings: &BTreeMap<String, Self>,
        visited: &mut BTreeSet<String>,
        out: &mut Vec<Coordinate>,
    ) {
        match self {
            Self::Value(_) | Self::Environment { .. } => {}
            Self::Reference(r) => out.push(r.coordinate(base)),
            Self::List(items) => {
                for item in items {
                    item.collect_references(base, siblings, visited, out);
                }
            }
            Self::Compound {
                parameter_names, ..
            } => {
                for name in parameter_names {
                    if visited.insert(name.clone())
                        && let Some(sibling) = siblings.get(name)
                    {
                        sibling.collect_references(base, siblings, visited, out);
                    }
                }
            }
        }
    }

    /// Resolve this parameter to a concrete JSON value.
    ///
    /// `base` is the owning config's coordinate, `context` the environment's
    /// resolution context, and `resolved_siblings` the sibling values already
    /// resolved for this config (consumed by compound parameters; the
    /// resolver orders siblings so they are present when needed).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnresolvedEnvVar`] for an unset variable with
    /// no default, [`ResolveError::UnresolvedReference`] /
    /// [`ResolveError::MissingProperty`] for reference failures, and
    /// [`ResolveError::UnknownCompoundReference`] /
    /// [`ResolveError::TemplateFailed`] for compound failures.
    pub fn resolve(
        &self,
        base: &Coordinate,
        context: &ResolutionContext,
        resolved_siblings: &BTreeMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, ResolveError> {
        match self {
            Self::Value(v) => Ok(v.clone()),
            Self::Environment { name, default } => match std::env::var(name) {
                Ok(v) => Ok(serde_json::Value::String(v)),
                Err(_) => default.as_ref().map_or_else(
                    || {
                        Err(ResolveError::UnresolvedEnvVar {
                            name: name.clone(),
                            coordinate: base.clone(),
                        })
                    },
                    |d| Ok(serde_json::Value::String(d.clone())),
                ),
            },
            Self::Reference(r) => {
                let target = r.coordinate(base);
                let entity =
                    context
                        .get(&target)
                        .ok_or_else(|| ResolveError::UnresolvedReference {
                            coordinate: base.clone(),
                            target: target.clone(),
                        })?;
                entity.properties.get(&r.property).cloned().ok_or_else(|| {
                    ResolveError::MissingProperty {
                        coordinate: base.clone(),
                        target,
                        property: r.property.clone(),
                    }
                })
            }
            Self::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(item.resolve(base, context, resolved_siblings)?);
                }
                Ok(serde_json::Value::Array(values))
            }
            Self::Compound {
                format,
                parameter_names,
            } => {
                let mut values = BTreeMap::new();
                for name in parameter_names {
                    let value = resolved_siblings.get(name).cloned().ok_or_else(|| {
                        ResolveError::UnknownCompoundReference {
                            coordinate: base.clone(),
                            parameter: "compound".to_string(),
                            missing: name.clone(),
                        }
                    })?;
                    values.insert(name.clone(), value);
                }
                let rendered = crate::template::render_format(format, &values).map_err(|e| {
                    ResolveError::TemplateFailed {
                        coordinate: base.clone(),
                        message: e,
                    }
                })?;
                Ok(serde_json::Value::String(rendered))
            }
        }
    }

    /// Resolve a parameter at load time, outside any resolution context.
    ///
    /// Only `value` and `environment` parameters support this; it is used for
    /// the `skip` field, which must be decidable before deployment starts.
    ///
    /// # Errors
    ///
    /// Returns a reason string for unsupported kinds or an unset variable.
    pub fn resolve_static(&self) -> Result<serde_json::Value, String> {
        match self {
            Self::Value(v) => Ok(v.clone()),
            Self::Environment { name, default } => match std::env::var(name) {
                Ok(v) => Ok(serde_json::Value::String(v)),
                Err(_) => default.as_ref().map_or_else(
                    || Err(format!("environment variable '{name}' is not set")),
                    |d| Ok(serde_json::Value::String(d.clone())),
                ),
            },
            Self::Reference(_) | Self::List(_) | Self::Compound { .. } => {
                Err("only 'value' and 'environment' parameters are allowed here".to_string())
            }
        }
    }

    /// Interpret a resolved value as a boolean.
    ///
    /// Accepts JSON booleans and the strings `"true"`/`"false"`
    /// (case-insensitive); everything else is `None`.
    #[must_use]
    pub fn as_bool(value: &serde_json::Value) -> Option<bool> {
        match value {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Convert a YAML value to JSON, rejecting non-string mapping keys.
fn yaml_to_json(value: &serde_yaml::Value) -> Result<serde_json::Value, String> {
    serde_json::to_value(value).map_err(|e| format!("unsupported YAML value: {e}"))
}

fn get_str(map: &serde_yaml::Mapping, key: &str) -> Option<String> {
    map.get(key)
        .and_then(serde_yaml::Value::as_str)
        .map(ToString::to_string)
}

fn require_str(map: &serde_yaml::Mapping, key: &str) -> Result<String, String> {
    get_str(map, key).ok_or_else(|| format!("missing or non-string field '{key}'"))
}

fn parse_value(map: &serde_yaml::Mapping) -> Result<Parameter, String> {
    let value = map
        .get("value")
        .ok_or_else(|| "value parameters require a 'value' field".to_string())?;
    Ok(Parameter::Value(yaml_to_json(value)?))
}

fn parse_environment(map: &serde_yaml::Mapping) -> Result<Parameter, String> {
    Ok(Parameter::Environment {
        name: require_str(map, "name")?,
        default: get_str(map, "default"),
    })
}

fn parse_reference(map: &serde_yaml::Mapping) -> Result<Parameter, String> {
    Ok(Parameter::Reference(ParameterReference {
        project: get_str(map, "project"),
        kind: get_str(map, "configType"),
        id: require_str(map, "configId")?,
        property: require_str(map, "property")?,
    }))
}

fn parse_list(map: &serde_yaml::Mapping) -> Result<Parameter, String> {
    let values = map
        .get("values")
        .and_then(serde_yaml::Value::as_sequence)
        .ok_or_else(|| "list parameters require a 'values' sequence".to_string())?;
    let items = values
        .iter()
        .map(Parameter::from_yaml)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Parameter::List(items))
}

fn parse_compound(map: &serde_yaml::Mapping) -> Result<Parameter, String> {
    let format = require_str(map, "format")?;
    let references = map
        .get("references")
        .and_then(serde_yaml::Value::as_sequence)
        .ok_or_else(|| "compound parameters require a 'references' sequence".to_string())?;
    let parameter_names = references
        .iter()
        .map(|v| {
            v.as_str()
                .map(ToString::to_string)
                .ok_or_else(|| "compound 'references' entries must be parameter names".to_string())
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Parameter::Compound {
        format,
        parameter_names,
    })
}

/// Parse the `[project, kind, id, property]` sequence shorthand.
///
/// Leading elements may be omitted: three elements mean the current project,
/// two mean the current project and kind.
fn parse_reference_shorthand(items: &[serde_yaml::Value]) -> Result<Parameter, String> {
    let parts = items
        .iter()
        .map(|v| {
            v.as_str().map(ToString::to_string).ok_or_else(|| {
                "reference shorthand sequences must contain only strings".to_string()
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let reference = match parts.as_slice() {
        [project, kind, id, property] => ParameterReference {
            project: Some(project.clone()),
            kind: Some(kind.clone()),
            id: id.clone(),
            property: property.clone(),
        },
        [kind, id, property] => ParameterReference {
            project: None,
            kind: Some(kind.clone()),
            id: id.clone(),
            property: property.clone(),
        },
        [id, property] => ParameterReference {
            project: None,
            kind: None,
            id: id.clone(),
            property: property.clone(),
        },
        _ => {
            return Err(format!(
                "reference shorthand must have 2 to 4 elements, got {}; \
                 use 'type: list' for value sequences",
                parts.len()
            ));
        }
    };
    Ok(Parameter::Reference(reference))
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
    use crate::model::entity::ResolvedEntity;
    use std::sync::Mutex;

    /// Serializes env-var manipulation across parallel test threads.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn base() -> Coordinate {
        Coordinate::new("proj", "alerting-profile", "cfg")
    }

    fn from_str(yaml: &str) -> Result<Parameter, String> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        Parameter::from_yaml(&value)
    }

    fn no_siblings() -> BTreeMap<String, Parameter> {
        BTreeMap::new()
    }

    fn no_values() -> BTreeMap<String, serde_json::Value> {
        BTreeMap::new()
    }

    // -----------------------------------------------------------------------
    // Parsing: shorthands
    // -----------------------------------------------------------------------

    #[test]
    fn scalar_parses_as_value() {
        let p = from_str("some text").unwrap();
        assert_eq!(p, Parameter::Value(serde_json::json!("some text")));
    }

    #[test]
    fn number_scalar_parses_as_value() {
        let p = from_str("42").unwrap();
        assert_eq!(p, Parameter::Value(serde_json::json!(42)));
    }

    #[test]
    fn bool_scalar_parses_as_value() {
        let p = from_str("true").unwrap();
        assert_eq!(p, Parameter::Value(serde_json::json!(true)));
    }

    #[test]
    fn four_element_sequence_is_full_reference() {
        let p = from_str(r#"["proj2", "schema-x", "cfg-id", "id"]"#).unwrap();
        let Parameter::Reference(r) = p else {
            panic!("expected reference")
        };
        assert_eq!(r.project.as_deref(), Some("proj2"));
        assert_eq!(r.kind.as_deref(), Some("schema-x"));
        assert_eq!(r.id, "cfg-id");
        assert_eq!(r.property, "id");
    }

    #[test]
    fn three_element_sequence_defaults_project() {
        let p = from_str(r#"["management-zone", "zone", "id"]"#).unwrap();
        let Parameter::Reference(r) = p else {
            panic!("expected reference")
        };
        assert_eq!(r.project, None);
        assert_eq!(r.kind.as_deref(), Some("management-zone"));
    }

    #[test]
    fn two_element_sequence_defaults_project_and_kind() {
        let p = from_str(r#"["other-cfg", "name"]"#).unwrap();
        let Parameter::Reference(r) = p else {
            panic!("expected reference")
        };
        assert_eq!(r.project, None);
        assert_eq!(r.kind, None);
        assert_eq!(r.id, "other-cfg");
        assert_eq!(r.property, "name");
    }

    #[test]
    fn one_element_sequence_is_rejected() {
        let err = from_str(r#"["only"]"#).unwrap_err();
        assert!(err.contains("2 to 4 elements"));
    }

    #[test]
    fn five_element_sequence_is_rejected() {
        let err = from_str(r#"["a", "b", "c", "d", "e"]"#).unwrap_err();
        assert!(err.contains("2 to 4 elements"));
        assert!(err.contains("type: list"));
    }

    #[test]
    fn non_string_sequence_is_rejected() {
        let err = from_str("[1, 2]").unwrap_err();
        assert!(err.contains("only strings"));
    }

    // -----------------------------------------------------------------------
    // Parsing: typed forms
    // -----------------------------------------------------------------------

    #[test]
    fn typed_value_parses() {
        let p = from_str("type: value\nvalue:\n  nested: [1, 2]\n").unwrap();
        assert_eq!(
            p,
            Parameter::Value(serde_json::json!({"nested": [1, 2]}))
        );
    }

    #[test]
    fn typed_environment_parses() {
        let p = from_str("type: environment\nname: MY_VAR\ndefault: fallback\n").unwrap();
        assert_eq!(
            p,
            Parameter::Environment {
                name: "MY_VAR".to_string(),
                default: Some("fallback".to_string()),
            }
        );
    }

    #[test]
    fn typed_environment_without_default_parses() {
        let p = from_str("type: environment\nname: MY_VAR\n").unwrap();
        let Parameter::Environment { default, .. } = p else {
            panic!("expected environment")
        };
        assert_eq!(default, None);
    }

    #[test]
    fn typed_reference_parses() {
        let p = from_str(
            "type: reference\nproject: infra\nconfigType: management-zone\nconfigId: zone\nproperty: id\n",
        )
        .unwrap();
        let Parameter::Reference(r) = p else {
            panic!("expected reference")
        };
        assert_eq!(r.project.as_deref(), Some("infra"));
        assert_eq!(r.property, "id");
    }

    #[test]
    fn typed_reference_without_project_parses() {
        let p = from_str("type: reference\nconfigId: zone\nproperty: id\n").unwrap();
        let Parameter::Reference(r) = p else {
            panic!("expected reference")
        };
        assert_eq!(r.project, None);
        assert_eq!(r.kind, None);
    }

    #[test]
    fn typed_list_parses_nested_parameters() {
        let p = from_str("type: list\nvalues:\n  - plain\n  - type: environment\n    name: V\n")
            .unwrap();
        let Parameter::List(items) = p else {
            panic!("expected list")
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Parameter::Value(_)));
        assert!(matches!(items[1], Parameter::Environment { .. }));
    }

    #[test]
    fn typed_compound_parses() {
        let p = from_str("type: compound\nformat: \"{{ a }}-{{ b }}\"\nreferences: [a, b]\n")
            .unwrap();
        let Parameter::Compound {
            parameter_names, ..
        } = p
        else {
            panic!("expected compound")
        };
        assert_eq!(parameter_names, vec!["a", "b"]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = from_str("type: secret\nname: X\n").unwrap_err();
        assert!(err.contains("unknown parameter type 'secret'"));
    }

    #[test]
    fn mapping_without_type_is_rejected() {
        let err = from_str("name: X\n").unwrap_err();
        assert!(err.contains("must declare a 'type'"));
    }

    #[test]
    fn reference_missing_config_id_is_rejected() {
        let err = from_str("type: reference\nproperty: id\n").unwrap_err();
        assert!(err.contains("configId"));
    }

    // -----------------------------------------------------------------------
    // references()
    // -----------------------------------------------------------------------

    #[test]
    fn value_and_environment_have_no_references() {
        let v = Parameter::Value(serde_json::json!(1));
        let e = Parameter::Environment {
            name: "X".to_string(),
            default: None,
        };
        assert!(v.references(&base(), &no_siblings()).is_empty());
        assert!(e.references(&base(), &no_siblings()).is_empty());
    }

    #[test]
    fn reference_defaults_fill_from_base_coordinate() {
        let p = from_str(r#"["other", "id"]"#).unwrap();
        let refs = p.references(&base(), &no_siblings());
        assert_eq!(refs, vec![Coordinate::new("proj", "alerting-profile", "other")]);
    }

    #[test]
    fn list_collects_nested_references() {
        let p = from_str(
            "type: list\nvalues:\n  - [\"zone-a\", \"id\"]\n  - [\"zone-b\", \"id\"]\n",
        )
        .unwrap();
        let refs = p.references(&base(), &no_siblings());
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn compound_collects_sibling_references() {
        let mut siblings = BTreeMap::new();
        siblings.insert(
            "zone".to_string(),
            from_str(r#"["infra", "management-zone", "main", "id"]"#).unwrap(),
        );
        let p = from_str("type: compound\nformat: \"{{ zone }}\"\nreferences: [zone]\n").unwrap();
        let refs = p.references(&base(), &siblings);
        assert_eq!(refs, vec![Coordinate::new("infra", "management-zone", "main")]);
    }

    #[test]
    fn compound_referencing_missing_sibling_yields_no_references() {
        let p = from_str("type: compound\nformat: \"{{ gone }}\"\nreferences: [gone]\n").unwrap();
        assert!(p.references(&base(), &no_siblings()).is_empty());
    }

    #[test]
    fn mutually_referencing_compounds_terminate() {
        let mut siblings = BTreeMap::new();
        siblings.insert(
            "a".to_string(),
            from_str("type: compound\nformat: \"{{ b }}\"\nreferences: [b]\n").unwrap(),
        );
        siblings.insert(
            "b".to_string(),
            from_str("type: compound\nformat: \"{{ a }}\"\nreferences: [a]\n").unwrap(),
        );
        let p = siblings.get("a").unwrap().clone();
        // Must not loop forever; no coordinate references exist either way.
        assert!(p.references(&base(), &siblings).is_empty());
    }

    #[test]
    fn references_are_deduplicated_and_sorted() {
        let p = from_str(
            "type: list\nvalues:\n  - [\"z\", \"id\"]\n  - [\"a\", \"id\"]\n  - [\"z\", \"id\"]\n",
        )
        .unwrap();
        let refs = p.references(&base(), &no_siblings());
        let ids: Vec<&str> = refs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "z"]);
    }

    // -----------------------------------------------------------------------
    // resolve()
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_value_returns_literal() {
        let p = Parameter::Value(serde_json::json!({"a": 1}));
        let v = p
            .resolve(&base(), &ResolutionContext::new(), &no_values())
            .unwrap();
        assert_eq!(v, serde_json::json!({"a": 1}));
    }

    #[test]
    #[allow(unsafe_code)]
    fn resolve_environment_reads_variable() {
        let _lock = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // SAFETY: protected by ENV_MUTEX; removed before the lock is released.
        unsafe { std::env::set_var("MONCFG_TEST_RESOLVE_VAR", "hello") };
        let p = Parameter::Environment {
            name: "MONCFG_TEST_RESOLVE_VAR".to_string(),
            default: None,
        };
        let v = p.resolve(&base(), &ResolutionContext::new(), &no_values());
        unsafe { std::env::remove_var("MONCFG_TEST_RESOLVE_VAR") };
        assert_eq!(v.unwrap(), serde_json::json!("hello"));
    }

    #[test]
    fn resolve_environment_uses_default_when_unset() {
        let p = Parameter::Environment {
            name: "MONCFG_TEST_DEFINITELY_UNSET".to_string(),
            default: Some("fallback".to_string()),
        };
        let v = p
            .resolve(&base(), &ResolutionContext::new(), &no_values())
            .unwrap();
        assert_eq!(v, serde_json::json!("fallback"));
    }

    #[test]
    fn resolve_environment_unset_without_default_fails() {
        let p = Parameter::Environment {
            name: "MONCFG_TEST_DEFINITELY_UNSET".to_string(),
            default: None,
        };
        let err = p
            .resolve(&base(), &ResolutionContext::new(), &no_values())
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnresolvedEnvVar { .. }));
    }

    #[test]
    fn resolve_reference_reads_entity_property() {
        let mut ctx = ResolutionContext::new();
        let target = Coordinate::new("proj", "alerting-profile", "other");
        let mut props = BTreeMap::new();
        props.insert("id".to_string(), serde_json::json!("obj-7"));
        ctx.insert(ResolvedEntity::deployed("other", target, props));

        let p = from_str(r#"["other", "id"]"#).unwrap();
        let v = p.resolve(&base(), &ctx, &no_values()).unwrap();
        assert_eq!(v, serde_json::json!("obj-7"));
    }

    #[test]
    fn resolve_reference_missing_entity_fails() {
        let p = from_str(r#"["missing", "id"]"#).unwrap();
        let err = p
            .resolve(&base(), &ResolutionContext::new(), &no_values())
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnresolvedReference { .. }));
    }

    #[test]
    fn resolve_reference_missing_property_fails() {
        let mut ctx = ResolutionContext::new();
        let target = Coordinate::new("proj", "alerting-profile", "other");
        ctx.insert(ResolvedEntity::deployed("other", target, BTreeMap::new()));
        let p = from_str(r#"["other", "owner"]"#).unwrap();
        let err = p.resolve(&base(), &ctx, &no_values()).unwrap_err();
        assert!(matches!(err, ResolveError::MissingProperty { .. }));
    }

    #[test]
    fn resolve_list_produces_array() {
        let p = Parameter::List(vec![
            Parameter::Value(serde_json::json!(1)),
            Parameter::Value(serde_json::json!("two")),
        ]);
        let v = p
            .resolve(&base(), &ResolutionContext::new(), &no_values())
            .unwrap();
        assert_eq!(v, serde_json::json!([1, "two"]));
    }

    #[test]
    fn resolve_compound_formats_sibling_values() {
        let mut resolved = BTreeMap::new();
        resolved.insert("host".to_string(), serde_json::json!("web-1"));
        resolved.insert("port".to_string(), serde_json::json!(8080));
        let p = Parameter::Compound {
            format: "{{ host }}:{{ port }}".to_string(),
            parameter_names: vec!["host".to_string(), "port".to_string()],
        };
        let v = p.resolve(&base(), &ResolutionContext::new(), &resolved).unwrap();
        assert_eq!(v, serde_json::json!("web-1:8080"));
    }

    #[test]
    fn resolve_compound_missing_sibling_fails() {
        let p = Parameter::Compound {
            format: "{{ gone }}".to_string(),
            parameter_names: vec!["gone".to_string()],
        };
        let err = p
            .resolve(&base(), &ResolutionContext::new(), &no_values())
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnknownCompoundReference { .. }));
    }

    // -----------------------------------------------------------------------
    // resolve_static / as_bool
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_static_value_works() {
        let p = Parameter::Value(serde_json::json!(true));
        assert_eq!(p.resolve_static().unwrap(), serde_json::json!(true));
    }

    #[test]
    fn resolve_static_rejects_reference() {
        let p = from_str(r#"["x", "id"]"#).unwrap();
        let err = p.resolve_static().unwrap_err();
        assert!(err.contains("'value' and 'environment'"));
    }

    #[test]
    fn resolve_static_rejects_list_and_compound() {
        assert!(Parameter::List(vec![]).resolve_static().is_err());
        let compound = Parameter::Compound {
            format: String::new(),
            parameter_names: vec![],
        };
        assert!(compound.resolve_static().is_err());
    }

    #[test]
    fn as_bool_accepts_bools_and_bool_strings() {
        assert_eq!(Parameter::as_bool(&serde_json::json!(true)), Some(true));
        assert_eq!(Parameter::as_bool(&serde_json::json!("false")), Some(false));
        assert_eq!(Parameter::as_bool(&serde_json::json!("TRUE")), Some(true));
        assert_eq!(Parameter::as_bool(&serde_json::json!("yes")), None);
        assert_eq!(Parameter::as_bool(&serde_json::json!(1)), None);
    }

    #[test]
    fn reserved_names_cover_engine_written_parameters() {
        assert!(RESERVED_PARAMETER_NAMES.contains(&"id"));
        assert!(RESERVED_PARAMETER_NAMES.contains(&"scope"));
        assert!(RESERVED_PARAMETER_NAMES.contains(&"name"));
    }
}
