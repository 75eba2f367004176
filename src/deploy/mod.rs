//! The deployer: sorted traversal, resolution, and idempotent upserts.
//!
//! One call deploys one environment: configs are sorted by their reference
//! graph, resolved against the accumulating resolution context, rendered,
//! and dispatched to the per-kind clients. Failures are captured per config;
//! strict mode stops at the first, resilient mode keeps going so dependents
//! surface their own unresolved-reference errors.

mod kinds;
mod resolver;

pub use resolver::{ResolvedConfig, resolve_config};

use crate::cancel::CancelToken;
use crate::client::ClientSet;
use crate::error::{ConfigDeployError, EngineError};
use crate::logging::Log;
use crate::manifest::EnvironmentDefinition;
use crate::model::{Config, ResolutionContext, ResolvedEntity};
use crate::sort;

/// Caller-selected behavior for one deployment run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Capture per-config failures and keep deploying independent configs.
    pub continue_on_error: bool,
    /// Validate, sort, and resolve without issuing any request.
    pub dry_run: bool,
}

/// The outcome of deploying one environment.
#[derive(Debug)]
pub struct EnvironmentDeployment {
    /// Environment name.
    pub environment: String,
    /// Entities produced by the traversal (including skipped ones).
    pub context: ResolutionContext,
    /// Per-config failures, empty on full success.
    pub errors: Vec<ConfigDeployError>,
}

impl EnvironmentDeployment {
    /// `true` when every config converged.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Deploy `configs` to one environment in dependency order.
///
/// Sorting errors abort before any request. Per-config failures become
/// [`ConfigDeployError`] entries in the result; in strict mode the first one
/// ends the traversal. A tripped cancellation token stops the traversal at
/// the next config boundary.
///
/// # Errors
///
/// Returns [`EngineError::Sort`] for cycles and dangling references. All
/// other failures are reported through the result's `errors`.
pub fn deploy_environment(
    environment: &EnvironmentDefinition,
    configs: Vec<Config>,
    clients: &ClientSet,
    log: &dyn Log,
    cancel: &CancelToken,
    options: DeployOptions,
) -> Result<EnvironmentDeployment, EngineError> {
    let sorted = sort::sort_configs(configs)?;
    log.stage(&format!(
        "Deploying {} configs to environment '{}'",
        sorted.len(),
        environment.name
    ));

    let mut context = ResolutionContext::new();
    let mut errors = Vec::new();

    for config in &sorted {
        if cancel.is_cancelled() {
            errors.push(ConfigDeployError {
                coordinate: config.coordinate.clone(),
                environment: environment.name.clone(),
                cause: crate::error::HttpError::Cancelled.into(),
            });
            break;
        }

        if config.skip {
            log.debug(&format!("skipping {} (skip=true)", config.coordinate));
            context.insert(ResolvedEntity::skipped(
                config.coordinate.clone(),
                config.origin_object_id.as_deref(),
            ));
            continue;
        }

        if let Err(cause) = deploy_one(config, &mut context, clients, log, options) {
            let error = ConfigDeployError {
                coordinate: config.coordinate.clone(),
                environment: environment.name.clone(),
                cause,
            };
            log.error(&error.to_string());
            errors.push(error);
            if !options.continue_on_error {
                break;
            }
        }
    }

    Ok(EnvironmentDeployment {
        environment: environment.name.clone(),
        context,
        errors,
    })
}

fn deploy_one(
    config: &Config,
    context: &mut ResolutionContext,
    clients: &ClientSet,
    log: &dyn Log,
    options: DeployOptions,
) -> anyhow::Result<()> {
    let resolved = resolve_config(config, context)?;

    if options.dry_run {
        log.dry_run(&format!(
            "would deploy {} ('{}')",
            config.coordinate, resolved.name
        ));
        // Record a stable id so dependents can still resolve and render.
        let stable_id = config
            .origin_object_id
            .clone()
            .unwrap_or_else(|| config.coordinate.external_id());
        let mut properties = std::collections::BTreeMap::new();
        properties.insert(
            crate::model::PROP_ID.to_string(),
            serde_json::json!(stable_id),
        );
        properties.insert(
            crate::model::PROP_NAME.to_string(),
            serde_json::json!(resolved.name),
        );
        context.insert(ResolvedEntity::deployed(
            resolved.name.clone(),
            config.coordinate.clone(),
            properties,
        ));
        return Ok(());
    }

    log.debug(&format!(
        "deploying {} ('{}')",
        config.coordinate, resolved.name
    ));
    let entity = kinds::deploy_resolved(config, &resolved, clients)?;
    log.info(&format!(
        "deployed {} ('{}', id {})",
        config.coordinate,
        resolved.name,
        entity.id().unwrap_or("-")
    ));
    context.insert(entity);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::client::transport::Method;
    use crate::client::transport::test_transport::MockTransport;
    use crate::error::ResolveError;
    use crate::logging::Logger;
    use crate::manifest::{Auth, Secret};
    use crate::model::{ConfigType, Coordinate, Parameter, ParameterReference, Template};
    use std::collections::BTreeMap;
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

    fn config(id: &str, references: &[(&str, &str, &str)]) -> Config {
        Config {
            coordinate: Coordinate::new("p", "auto-tag", id),
            group: "default".to_string(),
            environment: "dev".to_string(),
            type_: ConfigType::ClassicApi {
                api: "auto-tag".to_string(),
                scope: None,
            },
            name: Parameter::Value(serde_json::json!(id)),
            parameters: BTreeMap::new(),
            template: Template {
                name: "t.json".to_string(),
                content: "{}".to_string(),
            },
            references: references
                .iter()
                .map(|(p, k, i)| Coordinate::new(*p, *k, *i))
                .collect(),
            skip: false,
            origin_object_id: None,
        }
    }

    fn run(
        mock: &Arc<MockTransport>,
        configs: Vec<Config>,
        options: DeployOptions,
    ) -> EnvironmentDeployment {
        let set = clients(mock);
        let log = Logger::new("test");
        deploy_environment(
            &environment(),
            configs,
            &set,
            &log,
            &CancelToken::new(),
            options,
        )
        .expect("sorting should succeed")
    }

    #[test]
    fn deploys_configs_and_fills_context() {
        // Each config: list (empty) then create.
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": []}"#),
            (201, r#"{"id": "id-a"}"#),
            (200, r#"{"values": []}"#),
            (201, r#"{"id": "id-b"}"#),
        ]));
        let result = run(
            &mock,
            vec![config("a", &[]), config("b", &[])],
            DeployOptions::default(),
        );
        assert!(result.is_success());
        assert_eq!(result.context.len(), 2);
        assert_eq!(
            result
                .context
                .get(&Coordinate::new("p", "auto-tag", "a"))
                .unwrap()
                .id(),
            Some("id-a")
        );
    }

    #[test]
    fn skipped_config_makes_no_request_but_resolves_for_dependents() {
        let mut skipped = config("base", &[]);
        skipped.skip = true;
        skipped.origin_object_id = Some("anchor-1".to_string());

        let mut dependent = config("dep", &[("p", "auto-tag", "base")]);
        dependent.parameters.insert(
            "baseId".to_string(),
            Parameter::Reference(ParameterReference {
                project: None,
                kind: None,
                id: "base".to_string(),
                property: "id".to_string(),
            }),
        );
        dependent.template.content = r#"{"ref": "{{ baseId }}"}"#.to_string();

        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": []}"#),
            (201, r#"{"id": "dep-1"}"#),
        ]));
        let result = run(&mock, vec![dependent, skipped], DeployOptions::default());
        assert!(result.is_success(), "errors: {:?}", result.errors);
        // Only the dependent issued requests (list + create).
        assert_eq!(mock.request_count(), 2);
        let create_body: serde_json::Value =
            serde_json::from_str(mock.requests()[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(create_body["ref"], "anchor-1");

        let entity = result
            .context
            .get(&Coordinate::new("p", "auto-tag", "base"))
            .unwrap();
        assert!(entity.skipped);
    }

    #[test]
    fn strict_mode_stops_at_first_failure() {
        // First config fails resolution (missing reference is caught by the
        // sorter, so fail via a 400 response instead).
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": []}"#),
            (400, "bad payload"),
        ]));
        let result = run(
            &mock,
            vec![config("a", &[]), config("b", &[])],
            DeployOptions::default(),
        );
        assert_eq!(result.errors.len(), 1);
        // b was never attempted.
        assert_eq!(mock.request_count(), 2);
    }

    #[test]
    fn resilient_mode_continues_after_failure() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": []}"#),
            (400, "bad payload"),
            (200, r#"{"values": []}"#),
            (201, r#"{"id": "id-b"}"#),
        ]));
        let result = run(
            &mock,
            vec![config("a", &[]), config("b", &[])],
            DeployOptions {
                continue_on_error: true,
                dry_run: false,
            },
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.context.len(), 1, "b deployed despite a's failure");
    }

    #[test]
    fn dependent_of_failed_config_reports_unresolved_reference() {
        let mut dependent = config("dep", &[("p", "auto-tag", "a")]);
        dependent.parameters.insert(
            "aId".to_string(),
            Parameter::Reference(ParameterReference {
                project: None,
                kind: None,
                id: "a".to_string(),
                property: "id".to_string(),
            }),
        );
        dependent.template.content = r#"{"ref": "{{ aId }}"}"#.to_string();

        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": []}"#),
            (400, "bad payload"),
        ]));
        let result = run(
            &mock,
            vec![config("a", &[]), dependent],
            DeployOptions {
                continue_on_error: true,
                dry_run: false,
            },
        );
        assert_eq!(result.errors.len(), 2);
        let second = result.errors[1].cause.downcast_ref::<ResolveError>();
        assert!(
            matches!(second, Some(ResolveError::UnresolvedReference { .. })),
            "expected UnresolvedReference, got {:?}",
            result.errors[1].cause
        );
    }

    #[test]
    fn dry_run_issues_no_requests_but_resolves_chain() {
        let mut dependent = config("dep", &[("p", "auto-tag", "a")]);
        dependent.parameters.insert(
            "aId".to_string(),
            Parameter::Reference(ParameterReference {
                project: None,
                kind: None,
                id: "a".to_string(),
                property: "id".to_string(),
            }),
        );
        dependent.template.content = r#"{"ref": "{{ aId }}"}"#.to_string();

        let mock = Arc::new(MockTransport::new());
        let result = run(
            &mock,
            vec![config("a", &[]), dependent],
            DeployOptions {
                continue_on_error: false,
                dry_run: true,
            },
        );
        assert!(result.is_success(), "errors: {:?}", result.errors);
        assert_eq!(mock.request_count(), 0);
        assert_eq!(result.context.len(), 2);
    }

    #[test]
    fn cancellation_stops_before_first_request() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, "{}")]));
        let set = clients(&mock);
        let log = Logger::new("test");
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = deploy_environment(
            &environment(),
            vec![config("a", &[])],
            &set,
            &log,
            &cancel,
            DeployOptions::default(),
        )
        .unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn cycle_aborts_before_any_request() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, "{}")]));
        let set = clients(&mock);
        let log = Logger::new("test");
        let result = deploy_environment(
            &environment(),
            vec![
                config("a", &[("p", "auto-tag", "b")]),
                config("b", &[("p", "auto-tag", "a")]),
            ],
            &set,
            &log,
            &CancelToken::new(),
            DeployOptions::default(),
        );
        assert!(matches!(result, Err(EngineError::Sort(_))));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn deployment_order_follows_references() {
        let mock = Arc::new(MockTransport::with_responses(&[
            (200, r#"{"values": []}"#),
            (201, r#"{"id": "id-base"}"#),
            (200, r#"{"values": []}"#),
            (201, r#"{"id": "id-dep"}"#),
        ]));
        let result = run(
            &mock,
            vec![
                config("zz-dep", &[("p", "auto-tag", "aa-base")]),
                config("aa-base", &[]),
            ],
            DeployOptions::default(),
        );
        assert!(result.is_success());
        let requests = mock.requests();
        let posts: Vec<_> = requests.iter().filter(|r| r.method == Method::Post).collect();
        assert_eq!(posts.len(), 2);
        // The base deployed first, so its entity carries the first id.
        assert_eq!(
            result
                .context
                .get(&Coordinate::new("p", "auto-tag", "aa-base"))
                .unwrap()
                .id(),
            Some("id-base")
        );
    }
}
