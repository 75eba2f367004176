//! Per-config parameter resolution and template rendering.
//!
//! Runs after the environment-wide sort: every coordinate a config
//! references already has an entity in the resolution context. Within one
//! config, compound parameters may consume sibling values, so siblings are
//! resolved to a fixpoint; a round without progress means the compounds
//! reference each other in a cycle.

use std::collections::BTreeMap;

use crate::error::ResolveError;
use crate::model::{Config, ConfigType, PROP_ID, PROP_NAME, PROP_SCOPE, Parameter, ResolutionContext};
use crate::template;

/// Everything the per-kind deployers need for one config.
#[derive(Debug)]
pub struct ResolvedConfig {
    /// The resolved, non-empty object name.
    pub name: String,
    /// The resolved scope, where the type has one.
    pub scope: Option<String>,
    /// The rendered template as JSON.
    pub payload: serde_json::Value,
    /// All resolved values (user parameters plus engine-written ones).
    pub values: BTreeMap<String, serde_json::Value>,
}

/// Resolve a config's parameters and render its template.
///
/// The value map handed to the template contains every user parameter plus
/// the engine-written `id`, `name`, and (when present) `scope`.
///
/// # Errors
///
/// Propagates parameter resolution failures and template/JSON errors.
pub fn resolve_config(
    config: &Config,
    context: &ResolutionContext,
) -> Result<ResolvedConfig, ResolveError> {
    let mut values = resolve_parameters(config, context)?;

    let name_value = config
        .name
        .resolve(&config.coordinate, context, &values)?;
    let name = scalar_string(&name_value).filter(|s| !s.is_empty()).ok_or(
        ResolveError::EmptyName {
            coordinate: config.coordinate.clone(),
        },
    )?;

    let scope = match &config.type_ {
        ConfigType::Settings { scope, .. } => Some(scope),
        ConfigType::ClassicApi { scope, .. } => scope.as_ref(),
        _ => None,
    };
    let scope = scope
        .map(|parameter| {
            let value = parameter.resolve(&config.coordinate, context, &values)?;
            scalar_string(&value).ok_or_else(|| ResolveError::TemplateFailed {
                coordinate: config.coordinate.clone(),
                message: format!("scope resolved to non-scalar value {value}"),
            })
        })
        .transpose()?;

    values.insert(PROP_ID.to_string(), serde_json::json!(config.coordinate.id));
    values.insert(PROP_NAME.to_string(), serde_json::json!(name));
    if let Some(scope) = &scope {
        values.insert(PROP_SCOPE.to_string(), serde_json::json!(scope));
    }

    let payload = template::render_template(
        &config.coordinate.to_string(),
        &config.coordinate,
        &config.template.content,
        &values,
    )?;

    Ok(ResolvedConfig {
        name,
        scope,
        payload,
        values,
    })
}

/// Resolve every user parameter, ordering compounds after the siblings they
/// consume.
fn resolve_parameters(
    config: &Config,
    context: &ResolutionContext,
) -> Result<BTreeMap<String, serde_json::Value>, ResolveError> {
    // Compounds naming a parameter that does not exist fail up front.
    for (name, parameter) in &config.parameters {
        if let Parameter::Compound {
            parameter_names, ..
        } = parameter
        {
            for sibling in parameter_names {
                if !config.parameters.contains_key(sibling) {
                    return Err(ResolveError::UnknownCompoundReference {
                        coordinate: config.coordinate.clone(),
                        parameter: name.clone(),
                        missing: sibling.clone(),
                    });
                }
            }
        }
    }

    let mut resolved: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    let mut pending: Vec<&String> = config.parameters.keys().collect();

    while !pending.is_empty() {
        let mut progressed = false;
        let mut still_pending = Vec::new();

        for name in pending {
            let Some(parameter) = config.parameters.get(name) else {
                continue;
            };
            let ready = match parameter {
                Parameter::Compound {
                    parameter_names, ..
                } => parameter_names.iter().all(|n| resolved.contains_key(n)),
                _ => true,
            };
            if ready {
                let value = parameter.resolve(&config.coordinate, context, &resolved)?;
                resolved.insert(name.clone(), value);
                progressed = true;
            } else {
                still_pending.push(name);
            }
        }

        if !progressed {
            return Err(ResolveError::CompoundCycle {
                coordinate: config.coordinate.clone(),
                parameters: still_pending.iter().map(|s| (*s).clone()).collect(),
            });
        }
        pending = still_pending;
    }

    Ok(resolved)
}

/// Render a resolved value as the string the platform expects.
fn scalar_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
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
    use crate::model::{Coordinate, ParameterReference, ResolvedEntity, Template};

    fn config_with(
        parameters: &[(&str, Parameter)],
        template: &str,
        name: Parameter,
    ) -> Config {
        Config {
            coordinate: Coordinate::new("proj", "auto-tag", "cfg"),
            group: "default".to_string(),
            environment: "dev".to_string(),
            type_: ConfigType::ClassicApi {
                api: "auto-tag".to_string(),
                scope: None,
            },
            name,
            parameters: parameters
                .iter()
                .map(|(n, p)| ((*n).to_string(), p.clone()))
                .collect(),
            template: Template {
                name: "t.json".to_string(),
                content: template.to_string(),
            },
            references: vec![],
            skip: false,
            origin_object_id: None,
        }
    }

    fn value(v: serde_json::Value) -> Parameter {
        Parameter::Value(v)
    }

    #[test]
    fn renders_template_with_engine_values() {
        let config = config_with(
            &[("severity", value(serde_json::json!("HIGH")))],
            r#"{"name": "{{ name }}", "id": "{{ id }}", "sev": "{{ severity }}"}"#,
            value(serde_json::json!("My tag")),
        );
        let resolved = resolve_config(&config, &ResolutionContext::new()).unwrap();
        assert_eq!(resolved.name, "My tag");
        assert_eq!(resolved.payload["name"], "My tag");
        assert_eq!(resolved.payload["id"], "cfg");
        assert_eq!(resolved.payload["sev"], "HIGH");
    }

    #[test]
    fn empty_name_is_rejected() {
        let config = config_with(&[], "{}", value(serde_json::json!("")));
        let err = resolve_config(&config, &ResolutionContext::new()).unwrap_err();
        assert!(matches!(err, ResolveError::EmptyName { .. }));
    }

    #[test]
    fn numeric_name_is_stringified() {
        let config = config_with(&[], "{}", value(serde_json::json!(42)));
        let resolved = resolve_config(&config, &ResolutionContext::new()).unwrap();
        assert_eq!(resolved.name, "42");
    }

    #[test]
    fn reference_parameter_reads_context() {
        let mut context = ResolutionContext::new();
        let target = Coordinate::new("proj", "management-zone", "zone");
        let mut props = BTreeMap::new();
        props.insert(PROP_ID.to_string(), serde_json::json!("ZONE-1"));
        context.insert(ResolvedEntity::deployed("zone", target, props));

        let config = config_with(
            &[(
                "zoneId",
                Parameter::Reference(ParameterReference {
                    project: None,
                    kind: Some("management-zone".to_string()),
                    id: "zone".to_string(),
                    property: PROP_ID.to_string(),
                }),
            )],
            r#"{"zone": "{{ zoneId }}"}"#,
            value(serde_json::json!("n")),
        );
        let resolved = resolve_config(&config, &context).unwrap();
        assert_eq!(resolved.payload["zone"], "ZONE-1");
    }

    #[test]
    fn missing_reference_fails_resolution() {
        let config = config_with(
            &[(
                "zoneId",
                Parameter::Reference(ParameterReference {
                    project: None,
                    kind: None,
                    id: "missing".to_string(),
                    property: PROP_ID.to_string(),
                }),
            )],
            "{}",
            value(serde_json::json!("n")),
        );
        let err = resolve_config(&config, &ResolutionContext::new()).unwrap_err();
        assert!(matches!(err, ResolveError::UnresolvedReference { .. }));
    }

    #[test]
    fn compound_resolves_after_its_siblings() {
        let config = config_with(
            &[
                ("host", value(serde_json::json!("web-1"))),
                (
                    "address",
                    Parameter::Compound {
                        format: "{{ host }}:443".to_string(),
                        parameter_names: vec!["host".to_string()],
                    },
                ),
            ],
            r#"{"addr": "{{ address }}"}"#,
            value(serde_json::json!("n")),
        );
        let resolved = resolve_config(&config, &ResolutionContext::new()).unwrap();
        assert_eq!(resolved.payload["addr"], "web-1:443");
    }

    #[test]
    fn chained_compounds_resolve_in_dependency_order() {
        let config = config_with(
            &[
                ("a", value(serde_json::json!("x"))),
                (
                    "b",
                    Parameter::Compound {
                        format: "{{ a }}!".to_string(),
                        parameter_names: vec!["a".to_string()],
                    },
                ),
                (
                    "c",
                    Parameter::Compound {
                        format: "[{{ b }}]".to_string(),
                        parameter_names: vec!["b".to_string()],
                    },
                ),
            ],
            r#"{"c": "{{ c }}"}"#,
            value(serde_json::json!("n")),
        );
        let resolved = resolve_config(&config, &ResolutionContext::new()).unwrap();
        assert_eq!(resolved.payload["c"], "[x!]");
    }

    #[test]
    fn compound_cycle_is_reported() {
        let config = config_with(
            &[
                (
                    "a",
                    Parameter::Compound {
                        format: "{{ b }}".to_string(),
                        parameter_names: vec!["b".to_string()],
                    },
                ),
                (
                    "b",
                    Parameter::Compound {
                        format: "{{ a }}".to_string(),
                        parameter_names: vec!["a".to_string()],
                    },
                ),
            ],
            "{}",
            value(serde_json::json!("n")),
        );
        let err = resolve_config(&config, &ResolutionContext::new()).unwrap_err();
        let ResolveError::CompoundCycle { parameters, .. } = err else {
            panic!("expected CompoundCycle, got {err:?}")
        };
        assert_eq!(parameters, vec!["a", "b"]);
    }

    #[test]
    fn compound_with_unknown_sibling_is_reported() {
        let config = config_with(
            &[(
                "a",
                Parameter::Compound {
                    format: "{{ nope }}".to_string(),
                    parameter_names: vec!["nope".to_string()],
                },
            )],
            "{}",
            value(serde_json::json!("n")),
        );
        let err = resolve_config(&config, &ResolutionContext::new()).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownCompoundReference { .. }));
    }

    #[test]
    fn invalid_rendered_json_carries_position() {
        let config = config_with(
            &[],
            "{\"broken\": }",
            value(serde_json::json!("n")),
        );
        let err = resolve_config(&config, &ResolutionContext::new()).unwrap_err();
        let ResolveError::InvalidRenderedJson { line, column, .. } = err else {
            panic!("expected InvalidRenderedJson, got {err:?}")
        };
        assert_eq!(line, 1);
        assert!(column > 0);
    }

    #[test]
    fn settings_scope_is_resolved_and_exposed() {
        let config = Config {
            type_: ConfigType::Settings {
                schema_id: "schema-x".to_string(),
                schema_version: None,
                scope: Parameter::Value(serde_json::json!("HOST-1")),
            },
            ..config_with(
                &[],
                r#"{"scope": "{{ scope }}"}"#,
                value(serde_json::json!("n")),
            )
        };
        let resolved = resolve_config(&config, &ResolutionContext::new()).unwrap();
        assert_eq!(resolved.scope.as_deref(), Some("HOST-1"));
        assert_eq!(resolved.payload["scope"], "HOST-1");
    }
}
