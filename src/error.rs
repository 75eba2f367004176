//! Domain-specific error types for the configuration deployment engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`ManifestError`],
//! [`ProjectError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! EngineError
//! ├── Manifest(ManifestError) — manifest parsing, env-var expansion, filters
//! ├── Project(ProjectError)   — config file parsing, type validation, duplicates
//! ├── Sort(SortError)         — dependency cycles, dangling references
//! ├── Resolve(ResolveError)   — parameter resolution, template rendering
//! └── Http(HttpError)         — transport failures, retry exhaustion
//! ```
//!
//! Deployment failures are collected separately: a [`ConfigDeployError`] wraps
//! the cause of one config's failure together with its coordinate and target
//! environment, and [`EnvironmentDeploymentErrors`] aggregates those per
//! environment for final reporting.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::Coordinate;

/// Top-level error type for the deployment engine.
///
/// Aggregates domain-specific sub-errors and is convertible to
/// [`anyhow::Error`] for use at CLI command boundaries.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Manifest-related error (parsing, env-var expansion, filtering).
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Project loading error (config files, type validation, duplicates).
    #[error("Project error: {0}")]
    Project(#[from] ProjectError),

    /// Dependency sorting error (cycle or dangling reference).
    #[error("Dependency error: {0}")]
    Sort(#[from] SortError),

    /// Parameter resolution or template rendering error.
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// HTTP client error (transport failure, retry exhaustion).
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
}

/// Errors that arise from manifest loading.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest document could not be parsed.
    #[error("Invalid manifest syntax in {file}: {message}")]
    InvalidSyntax {
        /// Path of the manifest file.
        file: String,
        /// Parser diagnostic, including position when available.
        message: String,
    },

    /// An I/O error occurred while reading the manifest.
    #[error("IO error reading manifest {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest declares an unsupported version.
    #[error("Unsupported manifest version '{0}'")]
    UnsupportedVersion(String),

    /// A URL or secret references an environment variable that is unset or empty.
    #[error("Environment variable '{0}' is not set or empty")]
    EnvVarMissing(String),

    /// Two environment definitions share the same name.
    #[error("Environment '{0}' is defined more than once")]
    DuplicateEnvironment(String),

    /// Two project definitions share the same name.
    #[error("Project '{0}' is defined more than once")]
    DuplicateProject(String),

    /// Two account definitions share the same name.
    #[error("Account '{0}' is defined more than once")]
    DuplicateAccount(String),

    /// An explicit filter matched nothing.
    #[error("No environment matched the requested {what}: {requested}")]
    NoMatch {
        /// What was filtered on ("names", "groups", "accounts").
        what: &'static str,
        /// The requested filter values, comma-joined.
        requested: String,
    },

    /// Accounts were required but none are declared.
    #[error("Manifest declares no accounts, but accounts are required")]
    NoAccounts,

    /// Multiple per-item errors, accumulated so one pass reports everything.
    #[error("{}", format_aggregate(.0))]
    Aggregate(Vec<ManifestError>),
}

/// Render an aggregate as one line per contained error.
fn format_aggregate(errors: &[ManifestError]) -> String {
    let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!("{} manifest errors:\n  {}", errors.len(), lines.join("\n  "))
}

/// Errors that arise from project and config-file loading.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// A config file could not be parsed as YAML.
    #[error("Invalid config syntax in {file}: {message}")]
    InvalidSyntax {
        /// Path of the config file.
        file: String,
        /// Parser diagnostic, including line/column when available.
        message: String,
    },

    /// An I/O error occurred while reading a project file.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file matches the legacy v1 layout, which is not parsed.
    #[error("{file} uses the legacy v1 config format; migrate it before deploying")]
    LegacyV1Detected {
        /// Path of the offending file.
        file: String,
    },

    /// A classic API id is not present in the known-API registry.
    #[error("Unknown API '{api}' in {file}")]
    UnknownApi {
        /// The undeclared API id.
        api: String,
        /// Path of the config file declaring it.
        file: String,
    },

    /// The same coordinate is declared twice.
    #[error("Duplicate config UID '{coordinate}'")]
    DuplicateUid {
        /// The duplicated coordinate.
        coordinate: Coordinate,
    },

    /// A user parameter uses a reserved name.
    #[error("Parameter name '{name}' is reserved (config '{coordinate}')")]
    ReservedParameter {
        /// The reserved name (`id`, `scope`, or `name`).
        name: String,
        /// Coordinate of the config declaring it.
        coordinate: Coordinate,
    },

    /// The type block is missing, empty, or declares more than one kind.
    #[error("Config '{id}' in {file}: {reason}")]
    InvalidType {
        /// The config entry id.
        id: String,
        /// Path of the config file.
        file: String,
        /// What is wrong with the type block.
        reason: String,
    },

    /// A parameter definition could not be understood.
    #[error("Config '{id}' in {file}: parameter '{name}': {reason}")]
    InvalidParameter {
        /// The config entry id.
        id: String,
        /// Path of the config file.
        file: String,
        /// The parameter name.
        name: String,
        /// What is wrong with the definition.
        reason: String,
    },

    /// The skip field did not resolve to a boolean.
    #[error("Config '{coordinate}': skip must resolve to a boolean: {reason}")]
    InvalidSkip {
        /// Coordinate of the config.
        coordinate: Coordinate,
        /// Why resolution failed.
        reason: String,
    },

    /// A non-unique-name API config lacks a stable identity.
    #[error(
        "Config '{coordinate}': API '{api}' has non-unique names; \
         set originObjectId or reference another config's id"
    )]
    MissingStableIdentity {
        /// Coordinate of the config.
        coordinate: Coordinate,
        /// The non-unique-name API id.
        api: String,
    },

    /// A template file named by a config does not exist.
    #[error("Config '{id}' in {file}: template '{template}' not found")]
    MissingTemplate {
        /// The config entry id.
        id: String,
        /// Path of the config file.
        file: String,
        /// The template path as written in the config.
        template: String,
    },
}

/// Errors that arise from dependency sorting.
#[derive(Error, Debug)]
pub enum SortError {
    /// The reference graph contains a cycle.
    #[error("Dependency cycle detected: {}", .coordinates.join(" -> "))]
    CycleDetected {
        /// Coordinates participating in the cycle, in discovery order.
        coordinates: Vec<String>,
    },

    /// A config references a coordinate that is not loaded.
    #[error("Config '{from}' references '{to}', which is not part of any loaded project")]
    DanglingReference {
        /// Coordinate of the referencing config.
        from: Coordinate,
        /// The unresolvable target coordinate.
        to: Coordinate,
    },
}

/// Errors that arise from parameter resolution and template rendering.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// An environment parameter names a variable that is unset, with no default.
    #[error("Environment variable '{name}' is not set (config '{coordinate}')")]
    UnresolvedEnvVar {
        /// The variable name.
        name: String,
        /// Coordinate of the config being resolved.
        coordinate: Coordinate,
    },

    /// A reference parameter points at a coordinate with no resolved entity.
    #[error("Config '{coordinate}' references '{target}', which has not been deployed")]
    UnresolvedReference {
        /// Coordinate of the config being resolved.
        coordinate: Coordinate,
        /// The referenced coordinate.
        target: Coordinate,
    },

    /// A referenced entity exists but lacks the requested property.
    #[error("Entity '{target}' has no property '{property}' (config '{coordinate}')")]
    MissingProperty {
        /// Coordinate of the config being resolved.
        coordinate: Coordinate,
        /// The referenced coordinate.
        target: Coordinate,
        /// The missing property name.
        property: String,
    },

    /// The mandatory name parameter resolved to an empty string.
    #[error("Config '{coordinate}': name must resolve to a non-empty string")]
    EmptyName {
        /// Coordinate of the config.
        coordinate: Coordinate,
    },

    /// Compound parameters reference each other in a cycle.
    #[error("Config '{coordinate}': compound parameter cycle: {}", .parameters.join(" -> "))]
    CompoundCycle {
        /// Coordinate of the config.
        coordinate: Coordinate,
        /// The parameter names involved.
        parameters: Vec<String>,
    },

    /// A compound parameter names a sibling that does not exist.
    #[error(
        "Config '{coordinate}': compound parameter '{parameter}' references unknown parameter '{missing}'"
    )]
    UnknownCompoundReference {
        /// Coordinate of the config.
        coordinate: Coordinate,
        /// The compound parameter name.
        parameter: String,
        /// The missing sibling name.
        missing: String,
    },

    /// The template could not be rendered.
    #[error("Config '{coordinate}': template rendering failed: {message}")]
    TemplateFailed {
        /// Coordinate of the config.
        coordinate: Coordinate,
        /// The template engine diagnostic.
        message: String,
    },

    /// The rendered template is not valid JSON.
    #[error(
        "Rendered template for '{location}' is not valid JSON at line {line}, column {column}: {snippet}"
    )]
    InvalidRenderedJson {
        /// Coordinate string of the config whose template failed.
        location: String,
        /// 1-based line of the syntax error.
        line: usize,
        /// 1-based column of the syntax error.
        column: usize,
        /// A bounded excerpt around the failing position.
        snippet: String,
    },
}

/// Errors that arise from the HTTP client layer.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The transport failed before a response was received.
    #[error("Network error calling {url}: {message}")]
    Network {
        /// The request URL.
        url: String,
        /// Transport diagnostic.
        message: String,
    },

    /// The platform answered with a non-success status.
    #[error("HTTP {status} from {url}: {excerpt}")]
    Failure {
        /// The response status code.
        status: u16,
        /// The request URL.
        url: String,
        /// A bounded excerpt of the response body.
        excerpt: String,
    },

    /// All retry attempts were consumed without a success.
    #[error("Giving up on {url} after {attempts} attempts (last status {status}): {excerpt}")]
    RetryBudgetExhausted {
        /// The request URL.
        url: String,
        /// Total attempts made.
        attempts: u32,
        /// Status of the final attempt (0 for network errors).
        status: u16,
        /// A bounded excerpt of the final response body.
        excerpt: String,
    },

    /// More than one live object matched a name during an upsert.
    #[error("Found {} objects named '{name}': {}", .ids.len(), .ids.join(", "))]
    AmbiguousMatch {
        /// The name that was looked up.
        name: String,
        /// Ids of all matching objects.
        ids: Vec<String>,
    },

    /// The operation was cancelled before completion.
    #[error("Cancelled")]
    Cancelled,

    /// A response body could not be parsed as the expected JSON shape.
    #[error("Unexpected response from {url}: {message}")]
    UnexpectedResponse {
        /// The request URL.
        url: String,
        /// Parser diagnostic.
        message: String,
    },
}

/// A single config's deployment failure, with its coordinate and environment.
#[derive(Debug)]
pub struct ConfigDeployError {
    /// Coordinate of the failed config.
    pub coordinate: Coordinate,
    /// Environment the deployment targeted.
    pub environment: String,
    /// The underlying cause.
    pub cause: anyhow::Error,
}

impl std::fmt::Display for ConfigDeployError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Deployment of '{}' to environment '{}' failed: {:#}",
            self.coordinate, self.environment, self.cause
        )
    }
}

impl std::error::Error for ConfigDeployError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let cause: &(dyn std::error::Error + 'static) = self.cause.as_ref();
        Some(cause)
    }
}

/// Deployment failures grouped by environment, for final reporting.
///
/// Rendered as one summary line per failed environment followed by the
/// individual structured errors. The process exits non-zero when any
/// environment has at least one entry.
#[derive(Debug, Default)]
pub struct EnvironmentDeploymentErrors {
    /// Failures keyed by environment name.
    pub errors: BTreeMap<String, Vec<ConfigDeployError>>,
}

impl EnvironmentDeploymentErrors {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure under its environment.
    pub fn push(&mut self, error: ConfigDeployError) {
        self.errors
            .entry(error.environment.clone())
            .or_default()
            .push(error);
    }

    /// Merge another collection into this one.
    pub fn merge(&mut self, other: Self) {
        for (env, mut errs) in other.errors {
            self.errors.entry(env).or_default().append(&mut errs);
        }
    }

    /// `true` when no environment recorded a failure.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of recorded failures across environments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }
}

impl std::fmt::Display for EnvironmentDeploymentErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (env, errs) in &self.errors {
            writeln!(
                f,
                "Deployment to environment '{env}' failed ({} errors)",
                errs.len()
            )?;
            for e in errs {
                writeln!(f, "  - {e}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for EnvironmentDeploymentErrors {}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::io;

    fn coord(project: &str, kind: &str, id: &str) -> Coordinate {
        Coordinate::new(project, kind, id)
    }

    // -----------------------------------------------------------------------
    // ManifestError
    // -----------------------------------------------------------------------

    #[test]
    fn manifest_error_env_var_missing_display() {
        let e = ManifestError::EnvVarMissing("PROD_TOKEN".to_string());
        assert_eq!(
            e.to_string(),
            "Environment variable 'PROD_TOKEN' is not set or empty"
        );
    }

    #[test]
    fn manifest_error_io_display() {
        let e = ManifestError::Io {
            path: "/work/manifest.yaml".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(e.to_string().contains("/work/manifest.yaml"));
        assert!(e.to_string().contains("IO error reading manifest"));
    }

    #[test]
    fn manifest_error_aggregate_lists_each_entry() {
        let e = ManifestError::Aggregate(vec![
            ManifestError::EnvVarMissing("A".to_string()),
            ManifestError::EnvVarMissing("B".to_string()),
        ]);
        let text = e.to_string();
        assert!(text.starts_with("2 manifest errors:"));
        assert!(text.contains('A'));
        assert!(text.contains('B'));
    }

    #[test]
    fn manifest_error_no_match_display() {
        let e = ManifestError::NoMatch {
            what: "names",
            requested: "prod,dev".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "No environment matched the requested names: prod,dev"
        );
    }

    // -----------------------------------------------------------------------
    // ProjectError
    // -----------------------------------------------------------------------

    #[test]
    fn project_error_legacy_v1_display() {
        let e = ProjectError::LegacyV1Detected {
            file: "infra/zones.yaml".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "infra/zones.yaml uses the legacy v1 config format; migrate it before deploying"
        );
    }

    #[test]
    fn project_error_unknown_api_display() {
        let e = ProjectError::UnknownApi {
            api: "not-an-api".to_string(),
            file: "p/x.yaml".to_string(),
        };
        assert_eq!(e.to_string(), "Unknown API 'not-an-api' in p/x.yaml");
    }

    #[test]
    fn project_error_duplicate_uid_display() {
        let e = ProjectError::DuplicateUid {
            coordinate: coord("infra", "management-zone", "main"),
        };
        assert_eq!(
            e.to_string(),
            "Duplicate config UID 'infra:management-zone:main'"
        );
    }

    #[test]
    fn project_error_reserved_parameter_display() {
        let e = ProjectError::ReservedParameter {
            name: "scope".to_string(),
            coordinate: coord("p", "k", "c"),
        };
        assert!(e.to_string().contains("reserved"));
        assert!(e.to_string().contains("scope"));
    }

    // -----------------------------------------------------------------------
    // SortError
    // -----------------------------------------------------------------------

    #[test]
    fn sort_error_cycle_display() {
        let e = SortError::CycleDetected {
            coordinates: vec!["p:a:1".to_string(), "p:b:2".to_string(), "p:a:1".to_string()],
        };
        assert_eq!(
            e.to_string(),
            "Dependency cycle detected: p:a:1 -> p:b:2 -> p:a:1"
        );
    }

    #[test]
    fn sort_error_dangling_display() {
        let e = SortError::DanglingReference {
            from: coord("svc", "dashboard", "main"),
            to: coord("infra", "management-zone", "gone"),
        };
        assert!(e.to_string().contains("svc:dashboard:main"));
        assert!(e.to_string().contains("infra:management-zone:gone"));
    }

    // -----------------------------------------------------------------------
    // ResolveError
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_error_unresolved_reference_display() {
        let e = ResolveError::UnresolvedReference {
            coordinate: coord("svc", "dashboard", "main"),
            target: coord("infra", "management-zone", "zone"),
        };
        assert!(e.to_string().contains("has not been deployed"));
    }

    #[test]
    fn resolve_error_invalid_rendered_json_display() {
        let e = ResolveError::InvalidRenderedJson {
            location: "p:dashboard:d".to_string(),
            line: 3,
            column: 7,
            snippet: "\"tiles\": [}".to_string(),
        };
        let text = e.to_string();
        assert!(text.contains("line 3"));
        assert!(text.contains("column 7"));
        assert!(text.contains("\"tiles\": [}"));
    }

    // -----------------------------------------------------------------------
    // HttpError
    // -----------------------------------------------------------------------

    #[test]
    fn http_error_failure_display() {
        let e = HttpError::Failure {
            status: 404,
            url: "https://env.example.com/api/config/v1/autoTags/x".to_string(),
            excerpt: "not found".to_string(),
        };
        assert!(e.to_string().starts_with("HTTP 404"));
        assert!(e.to_string().contains("not found"));
    }

    #[test]
    fn http_error_retry_exhausted_display() {
        let e = HttpError::RetryBudgetExhausted {
            url: "https://env.example.com/api".to_string(),
            attempts: 4,
            status: 503,
            excerpt: "unavailable".to_string(),
        };
        assert!(e.to_string().contains("after 4 attempts"));
        assert!(e.to_string().contains("503"));
    }

    // -----------------------------------------------------------------------
    // ConfigDeployError / EnvironmentDeploymentErrors
    // -----------------------------------------------------------------------

    #[test]
    fn config_deploy_error_display_includes_coordinate_and_environment() {
        let e = ConfigDeployError {
            coordinate: coord("infra", "alerting-profile", "main"),
            environment: "prod".to_string(),
            cause: anyhow::anyhow!("boom"),
        };
        let text = e.to_string();
        assert!(text.contains("infra:alerting-profile:main"));
        assert!(text.contains("prod"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn config_deploy_error_has_source() {
        use std::error::Error as _;
        let e = ConfigDeployError {
            coordinate: coord("p", "k", "c"),
            environment: "e".to_string(),
            cause: anyhow::anyhow!("cause"),
        };
        assert!(e.source().is_some());
    }

    #[test]
    fn environment_errors_group_by_environment() {
        let mut agg = EnvironmentDeploymentErrors::new();
        for (env, id) in [("prod", "a"), ("dev", "b"), ("prod", "c")] {
            agg.push(ConfigDeployError {
                coordinate: coord("p", "k", id),
                environment: env.to_string(),
                cause: anyhow::anyhow!("x"),
            });
        }
        assert_eq!(agg.len(), 3);
        assert_eq!(agg.errors["prod"].len(), 2);
        assert_eq!(agg.errors["dev"].len(), 1);
    }

    #[test]
    fn environment_errors_display_has_summary_line_per_environment() {
        let mut agg = EnvironmentDeploymentErrors::new();
        agg.push(ConfigDeployError {
            coordinate: coord("p", "k", "a"),
            environment: "prod".to_string(),
            cause: anyhow::anyhow!("x"),
        });
        let text = agg.to_string();
        assert!(text.contains("Deployment to environment 'prod' failed (1 errors)"));
    }

    #[test]
    fn environment_errors_merge() {
        let mut a = EnvironmentDeploymentErrors::new();
        a.push(ConfigDeployError {
            coordinate: coord("p", "k", "a"),
            environment: "prod".to_string(),
            cause: anyhow::anyhow!("x"),
        });
        let mut b = EnvironmentDeploymentErrors::new();
        b.push(ConfigDeployError {
            coordinate: coord("p", "k", "b"),
            environment: "prod".to_string(),
            cause: anyhow::anyhow!("y"),
        });
        a.merge(b);
        assert_eq!(a.errors["prod"].len(), 2);
    }

    #[test]
    fn environment_errors_empty() {
        let agg = EnvironmentDeploymentErrors::new();
        assert!(agg.is_empty());
        assert_eq!(agg.len(), 0);
    }

    // -----------------------------------------------------------------------
    // Send + Sync bounds
    // -----------------------------------------------------------------------

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<EngineError>();
        assert_send_sync::<ManifestError>();
        assert_send_sync::<ProjectError>();
        assert_send_sync::<SortError>();
        assert_send_sync::<ResolveError>();
        assert_send_sync::<HttpError>();
        assert_send_sync::<ConfigDeployError>();
        assert_send_sync::<EnvironmentDeploymentErrors>();
    }

    // -----------------------------------------------------------------------
    // anyhow conversion
    // -----------------------------------------------------------------------

    #[test]
    fn engine_error_converts_to_anyhow() {
        let e = EngineError::Sort(SortError::CycleDetected {
            coordinates: vec!["a".to_string()],
        });
        let _anyhow_err: anyhow::Error = e.into();
    }

    #[test]
    fn http_error_converts_to_anyhow() {
        let e = HttpError::Cancelled;
        let _anyhow_err: anyhow::Error = e.into();
    }
}
