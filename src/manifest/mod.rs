//! Manifest loading: projects, environments, accounts, and their auth.
//!
//! The manifest is the tool's top-level input. Loading expands every
//! environment-variable indirection (URLs and secrets) eagerly so later
//! stages never touch the process environment, and accumulates per-item
//! errors so a single run reports every problem in the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ManifestError;

/// Supported major manifest version.
const SUPPORTED_MAJOR_VERSION: &str = "1";

/// A secret taken from an environment variable.
///
/// The resolved value is deliberately excluded from `Debug` output; logs may
/// only ever show the variable name and whether a value is present.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    /// Name of the environment variable the value came from.
    pub name: String,
    value: String,
}

impl Secret {
    /// Create a secret from its variable name and resolved value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The resolved secret value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `true` when a non-empty value was resolved.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.value.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("name", &self.name)
            .field("present", &self.is_present())
            .finish()
    }
}

/// OAuth client credentials for platform APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The OAuth client id.
    pub client_id: Secret,
    /// The OAuth client secret.
    pub client_secret: Secret,
    /// Token endpoint override; the built-in default applies when `None`.
    pub token_endpoint: Option<String>,
}

/// Authentication for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// Classic access token only.
    Token(Secret),
    /// Classic token plus platform OAuth credentials.
    Platform {
        /// Classic access token.
        token: Secret,
        /// Platform OAuth client credentials.
        o_auth: OAuthCredentials,
    },
}

impl Auth {
    /// The classic access token.
    #[must_use]
    pub const fn token(&self) -> &Secret {
        match self {
            Self::Token(token) | Self::Platform { token, .. } => token,
        }
    }

    /// The OAuth credentials, when the environment has platform access.
    #[must_use]
    pub const fn o_auth(&self) -> Option<&OAuthCredentials> {
        match self {
            Self::Token(_) => None,
            Self::Platform { o_auth, .. } => Some(o_auth),
        }
    }

    /// `true` when platform (OAuth) APIs can be used.
    #[must_use]
    pub const fn has_platform(&self) -> bool {
        matches!(self, Self::Platform { .. })
    }
}

/// One project declared by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDefinition {
    /// Project id, unique within the manifest.
    pub name: String,
    /// Directory of the project's config files, relative to the manifest.
    pub path: PathBuf,
}

/// One tenant environment declared by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDefinition {
    /// Environment name, globally unique within the manifest.
    pub name: String,
    /// Name of the environment group this environment belongs to.
    pub group: String,
    /// Resolved base URL of the environment.
    pub url: String,
    /// Resolved authentication material.
    pub auth: Auth,
}

/// One account declared by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDefinition {
    /// Account name, unique within the manifest.
    pub name: String,
    /// The account UUID.
    pub account_uuid: String,
    /// Account API base URL override.
    pub api_url: Option<String>,
    /// OAuth credentials for the account API.
    pub o_auth: OAuthCredentials,
}

/// The validated manifest: projects, environments, and accounts.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Projects by id.
    pub projects: BTreeMap<String, ProjectDefinition>,
    /// Environments by name, already filtered per the loader options.
    pub environments: BTreeMap<String, EnvironmentDefinition>,
    /// Accounts by name, already filtered per the loader options.
    pub accounts: BTreeMap<String, AccountDefinition>,
}

/// Filters and toggles applied while loading a manifest.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Restrict to these environment names (empty = no restriction).
    pub environment_names: Vec<String>,
    /// Restrict to these environment groups (empty = no restriction).
    pub environment_groups: Vec<String>,
    /// Restrict to these account names (empty = no restriction).
    pub account_names: Vec<String>,
    /// Fail when the manifest declares no account.
    pub require_accounts: bool,
}

// ---------------------------------------------------------------------------
// File format (serde shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ManifestFile {
    manifest_version: serde_yaml::Value,
    projects: Vec<ProjectEntry>,
    environment_groups: Vec<GroupEntry>,
    #[serde(default)]
    accounts: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectEntry {
    name: String,
    path: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupEntry {
    name: String,
    environments: Vec<EnvironmentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvironmentEntry {
    name: String,
    url: UrlEntry,
    auth: AuthEntry,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UrlEntry {
    #[serde(rename = "type")]
    type_: Option<String>,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct AuthEntry {
    token: SecretEntry,
    o_auth: Option<OAuthEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SecretEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct OAuthEntry {
    client_id: SecretEntry,
    client_secret: SecretEntry,
    token_endpoint: Option<UrlEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct AccountEntry {
    name: String,
    account_uuid: String,
    api_url: Option<UrlEntry>,
    o_auth: OAuthEntry,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate a manifest.
///
/// Structural errors (unreadable file, YAML syntax, unknown keys,
/// unsupported version) fail immediately. Per-item resolution errors are
/// accumulated and returned together; no manifest is returned in that case
/// either — the loader contract is complete-or-nothing.
///
/// # Errors
///
/// Returns [`ManifestError`] as described above; multiple per-item failures
/// come back as [`ManifestError::Aggregate`].
pub fn load(path: &Path, options: &LoaderOptions) -> Result<Manifest, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let file: ManifestFile =
        serde_yaml::from_str(&content).map_err(|e| ManifestError::InvalidSyntax {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;

    check_version(&file.manifest_version)?;

    let manifest_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut errors: Vec<ManifestError> = Vec::new();

    let projects = load_projects(&file.projects, manifest_dir, &mut errors);
    let environments = load_environments(&file.environment_groups, &mut errors);
    let accounts = load_accounts(&file.accounts, &mut errors);

    if !errors.is_empty() {
        return Err(if errors.len() == 1 {
            errors.remove(0)
        } else {
            ManifestError::Aggregate(errors)
        });
    }

    let environments = apply_environment_filters(environments, options)?;
    let accounts = apply_account_filters(accounts, options)?;

    if options.require_accounts && accounts.is_empty() {
        return Err(ManifestError::NoAccounts);
    }

    Ok(Manifest {
        projects,
        environments,
        accounts,
    })
}

fn check_version(version: &serde_yaml::Value) -> Result<(), ManifestError> {
    let text = match version {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => format!("{other:?}"),
    };
    let major = text.split('.').next().unwrap_or("");
    if major == SUPPORTED_MAJOR_VERSION {
        Ok(())
    } else {
        Err(ManifestError::UnsupportedVersion(text))
    }
}

fn load_projects(
    entries: &[ProjectEntry],
    manifest_dir: &Path,
    errors: &mut Vec<ManifestError>,
) -> BTreeMap<String, ProjectDefinition> {
    let mut projects = BTreeMap::new();
    for entry in entries {
        if let Some(kind) = entry.type_.as_deref()
            && kind != "simple"
        {
            errors.push(ManifestError::InvalidSyntax {
                file: entry.name.clone(),
                message: format!("unknown project type '{kind}'"),
            });
            continue;
        }
        let path = manifest_dir.join(entry.path.as_deref().unwrap_or(&entry.name));
        let definition = ProjectDefinition {
            name: entry.name.clone(),
            path,
        };
        if projects.insert(entry.name.clone(), definition).is_some() {
            errors.push(ManifestError::DuplicateProject(entry.name.clone()));
        }
    }
    projects
}

fn load_environments(
    groups: &[GroupEntry],
    errors: &mut Vec<ManifestError>,
) -> BTreeMap<String, EnvironmentDefinition> {
    let mut environments = BTreeMap::new();
    for group in groups {
        for entry in &group.environments {
            let url = match resolve_url(&entry.url) {
                Ok(url) => url,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let auth = match resolve_auth(&entry.auth) {
                Ok(auth) => auth,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let definition = EnvironmentDefinition {
                name: entry.name.clone(),
                group: group.name.clone(),
                url: url.trim_end_matches('/').to_string(),
                auth,
            };
            if environments.insert(entry.name.clone(), definition).is_some() {
                errors.push(ManifestError::DuplicateEnvironment(entry.name.clone()));
            }
        }
    }
    environments
}

fn load_accounts(
    entries: &[AccountEntry],
    errors: &mut Vec<ManifestError>,
) -> BTreeMap<String, AccountDefinition> {
    let mut accounts = BTreeMap::new();
    for entry in entries {
        let o_auth = match resolve_oauth(&entry.o_auth) {
            Ok(o) => o,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        let api_url = match &entry.api_url {
            Some(url) => match resolve_url(url) {
                Ok(u) => Some(u),
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            },
            None => None,
        };
        let definition = AccountDefinition {
            name: entry.name.clone(),
            account_uuid: entry.account_uuid.clone(),
            api_url,
            o_auth,
        };
        if accounts.insert(entry.name.clone(), definition).is_some() {
            errors.push(ManifestError::DuplicateAccount(entry.name.clone()));
        }
    }
    accounts
}

/// Expand a URL entry: literal values verbatim, environment indirection
/// through a non-empty variable.
fn resolve_url(entry: &UrlEntry) -> Result<String, ManifestError> {
    match entry.type_.as_deref() {
        None | Some("value") => Ok(entry.value.clone()),
        Some("environment") => resolve_env_var(&entry.value),
        Some(other) => Err(ManifestError::InvalidSyntax {
            file: entry.value.clone(),
            message: format!("unknown url type '{other}'"),
        }),
    }
}

fn resolve_env_var(name: &str) -> Result<String, ManifestError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ManifestError::EnvVarMissing(name.to_string())),
    }
}

fn resolve_secret(entry: &SecretEntry) -> Result<Secret, ManifestError> {
    let value = resolve_env_var(&entry.name)?;
    Ok(Secret::new(entry.name.clone(), value))
}

fn resolve_oauth(entry: &OAuthEntry) -> Result<OAuthCredentials, ManifestError> {
    let client_id = resolve_secret(&entry.client_id)?;
    let client_secret = resolve_secret(&entry.client_secret)?;
    let token_endpoint = match &entry.token_endpoint {
        Some(url) => Some(resolve_url(url)?),
        None => None,
    };
    Ok(OAuthCredentials {
        client_id,
        client_secret,
        token_endpoint,
    })
}

fn resolve_auth(entry: &AuthEntry) -> Result<Auth, ManifestError> {
    let token = resolve_secret(&entry.token)?;
    match &entry.o_auth {
        None => Ok(Auth::Token(token)),
        Some(o_auth) => Ok(Auth::Platform {
            token,
            o_auth: resolve_oauth(o_auth)?,
        }),
    }
}

fn apply_environment_filters(
    environments: BTreeMap<String, EnvironmentDefinition>,
    options: &LoaderOptions,
) -> Result<BTreeMap<String, EnvironmentDefinition>, ManifestError> {
    let mut filtered = environments;
    if !options.environment_names.is_empty() {
        filtered.retain(|name, _| options.environment_names.contains(name));
        if filtered.is_empty() {
            return Err(ManifestError::NoMatch {
                what: "names",
                requested: options.environment_names.join(","),
            });
        }
    }
    if !options.environment_groups.is_empty() {
        filtered.retain(|_, env| options.environment_groups.contains(&env.group));
        if filtered.is_empty() {
            return Err(ManifestError::NoMatch {
                what: "groups",
                requested: options.environment_groups.join(","),
            });
        }
    }
    Ok(filtered)
}

fn apply_account_filters(
    accounts: BTreeMap<String, AccountDefinition>,
    options: &LoaderOptions,
) -> Result<BTreeMap<String, AccountDefinition>, ManifestError> {
    if options.account_names.is_empty() {
        return Ok(accounts);
    }
    let mut filtered = accounts;
    filtered.retain(|name, _| options.account_names.contains(name));
    if filtered.is_empty() {
        return Err(ManifestError::NoMatch {
            what: "accounts",
            requested: options.account_names.join(","),
        });
    }
    Ok(filtered)
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic,
    unsafe_code
)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes env-var manipulation across parallel test threads.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Set env vars for the duration of one closure, restoring afterwards.
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _lock = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // SAFETY: protected by ENV_MUTEX; removed before the lock is released.
        for (k, v) in vars {
            unsafe { std::env::set_var(k, v) };
        }
        let result = f();
        for (k, _) in vars {
            unsafe { std::env::remove_var(k) };
        }
        result
    }

    fn write_manifest(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("manifest.yaml");
        std::fs::write(&path, content).expect("write manifest");
        (dir, path)
    }

    const BASIC: &str = r"
manifestVersion: '1.0'
projects:
  - name: infra
environmentGroups:
  - name: default
    environments:
      - name: dev
        url:
          value: https://dev.example.com/
        auth:
          token:
            name: DEV_TOKEN
";

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[test]
    fn loads_basic_manifest() {
        let (_dir, path) = write_manifest(BASIC);
        let manifest = with_env(&[("DEV_TOKEN", "secret-token")], || {
            load(&path, &LoaderOptions::default())
        })
        .unwrap();
        assert_eq!(manifest.projects.len(), 1);
        assert_eq!(manifest.environments.len(), 1);
        let env = &manifest.environments["dev"];
        assert_eq!(env.group, "default");
        assert_eq!(env.url, "https://dev.example.com");
        assert_eq!(env.auth.token().value(), "secret-token");
        assert!(!env.auth.has_platform());
    }

    #[test]
    fn project_path_defaults_to_name_relative_to_manifest() {
        let (dir, path) = write_manifest(BASIC);
        let manifest = with_env(&[("DEV_TOKEN", "t")], || {
            load(&path, &LoaderOptions::default())
        })
        .unwrap();
        assert_eq!(manifest.projects["infra"].path, dir.path().join("infra"));
    }

    #[test]
    fn loads_platform_auth_and_accounts() {
        let (_dir, path) = write_manifest(
            r"
manifestVersion: '1.0'
projects:
  - name: p
environmentGroups:
  - name: g
    environments:
      - name: prod
        url:
          type: environment
          value: PROD_URL
        auth:
          token:
            name: PROD_TOKEN
          oAuth:
            clientId:
              name: PROD_CLIENT_ID
            clientSecret:
              name: PROD_CLIENT_SECRET
accounts:
  - name: main
    accountUuid: 11111111-2222-3333-4444-555555555555
    oAuth:
      clientId:
        name: PROD_CLIENT_ID
      clientSecret:
        name: PROD_CLIENT_SECRET
",
        );
        let manifest = with_env(
            &[
                ("PROD_URL", "https://prod.example.com"),
                ("PROD_TOKEN", "t"),
                ("PROD_CLIENT_ID", "cid"),
                ("PROD_CLIENT_SECRET", "cs"),
            ],
            || load(&path, &LoaderOptions::default()),
        )
        .unwrap();
        let env = &manifest.environments["prod"];
        assert_eq!(env.url, "https://prod.example.com");
        assert!(env.auth.has_platform());
        assert_eq!(env.auth.o_auth().unwrap().client_id.value(), "cid");
        assert_eq!(manifest.accounts.len(), 1);
        assert_eq!(
            manifest.accounts["main"].account_uuid,
            "11111111-2222-3333-4444-555555555555"
        );
    }

    // -----------------------------------------------------------------------
    // Structural failures
    // -----------------------------------------------------------------------

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.yaml"), &LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let (_dir, path) = write_manifest(
            "manifestVersion: '1.0'\nprojects: []\nenvironmentGroups: []\nsurprise: true\n",
        );
        let err = load(&path, &LoaderOptions::default()).unwrap_err();
        let ManifestError::InvalidSyntax { message, .. } = err else {
            panic!("expected InvalidSyntax, got {err:?}")
        };
        assert!(message.contains("surprise"));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let (_dir, path) =
            write_manifest("manifestVersion: '2.0'\nprojects: []\nenvironmentGroups: []\n");
        let err = load(&path, &LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn numeric_version_is_accepted() {
        let (_dir, path) =
            write_manifest("manifestVersion: 1.0\nprojects: []\nenvironmentGroups: []\n");
        assert!(load(&path, &LoaderOptions::default()).is_ok());
    }

    // -----------------------------------------------------------------------
    // Per-item failures accumulate
    // -----------------------------------------------------------------------

    #[test]
    fn missing_env_vars_accumulate() {
        let (_dir, path) = write_manifest(
            r"
manifestVersion: '1.0'
projects: []
environmentGroups:
  - name: g
    environments:
      - name: a
        url: {value: 'https://a'}
        auth: {token: {name: MONCFG_TEST_UNSET_A}}
      - name: b
        url: {value: 'https://b'}
        auth: {token: {name: MONCFG_TEST_UNSET_B}}
",
        );
        let err = load(&path, &LoaderOptions::default()).unwrap_err();
        let ManifestError::Aggregate(errors) = err else {
            panic!("expected Aggregate, got {err:?}")
        };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn empty_env_var_is_missing() {
        let (_dir, path) = write_manifest(BASIC);
        let err = with_env(&[("DEV_TOKEN", "")], || {
            load(&path, &LoaderOptions::default())
        })
        .unwrap_err();
        assert!(matches!(err, ManifestError::EnvVarMissing(v) if v == "DEV_TOKEN"));
    }

    #[test]
    fn duplicate_environment_across_groups_is_rejected() {
        let (_dir, path) = write_manifest(
            r"
manifestVersion: '1.0'
projects: []
environmentGroups:
  - name: g1
    environments:
      - name: dup
        url: {value: 'https://a'}
        auth: {token: {name: T1}}
  - name: g2
    environments:
      - name: dup
        url: {value: 'https://b'}
        auth: {token: {name: T1}}
",
        );
        let err = with_env(&[("T1", "x")], || load(&path, &LoaderOptions::default()))
            .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateEnvironment(n) if n == "dup"));
    }

    #[test]
    fn unknown_project_type_is_rejected() {
        let (_dir, path) = write_manifest(
            "manifestVersion: '1.0'\nprojects:\n  - name: p\n    type: grouped\nenvironmentGroups: []\n",
        );
        let err = load(&path, &LoaderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unknown project type"));
    }

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    const TWO_ENVS: &str = r"
manifestVersion: '1.0'
projects: []
environmentGroups:
  - name: nonprod
    environments:
      - name: dev
        url: {value: 'https://dev'}
        auth: {token: {name: T1}}
  - name: prod
    environments:
      - name: live
        url: {value: 'https://live'}
        auth: {token: {name: T1}}
";

    #[test]
    fn name_filter_retains_matches() {
        let (_dir, path) = write_manifest(TWO_ENVS);
        let options = LoaderOptions {
            environment_names: vec!["dev".to_string()],
            ..LoaderOptions::default()
        };
        let manifest = with_env(&[("T1", "x")], || load(&path, &options)).unwrap();
        assert_eq!(manifest.environments.len(), 1);
        assert!(manifest.environments.contains_key("dev"));
    }

    #[test]
    fn group_filter_retains_matches() {
        let (_dir, path) = write_manifest(TWO_ENVS);
        let options = LoaderOptions {
            environment_groups: vec!["prod".to_string()],
            ..LoaderOptions::default()
        };
        let manifest = with_env(&[("T1", "x")], || load(&path, &options)).unwrap();
        assert_eq!(manifest.environments.len(), 1);
        assert!(manifest.environments.contains_key("live"));
    }

    #[test]
    fn name_filter_with_no_match_fails() {
        let (_dir, path) = write_manifest(TWO_ENVS);
        let options = LoaderOptions {
            environment_names: vec!["staging".to_string()],
            ..LoaderOptions::default()
        };
        let err = with_env(&[("T1", "x")], || load(&path, &options)).unwrap_err();
        assert!(matches!(err, ManifestError::NoMatch { what: "names", .. }));
    }

    #[test]
    fn require_accounts_without_accounts_fails() {
        let (_dir, path) = write_manifest(BASIC);
        let options = LoaderOptions {
            require_accounts: true,
            ..LoaderOptions::default()
        };
        let err = with_env(&[("DEV_TOKEN", "x")], || load(&path, &options)).unwrap_err();
        assert!(matches!(err, ManifestError::NoAccounts));
    }

    // -----------------------------------------------------------------------
    // Secret redaction
    // -----------------------------------------------------------------------

    #[test]
    fn secret_debug_never_shows_value() {
        let secret = Secret::new("TOKEN_VAR", "super-secret-value");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("TOKEN_VAR"));
        assert!(debug.contains("present: true"));
    }

    #[test]
    fn empty_secret_reports_absent() {
        let secret = Secret::new("X", "");
        assert!(!secret.is_present());
        assert!(format!("{secret:?}").contains("present: false"));
    }

    #[test]
    fn manifest_debug_never_shows_secret_values() {
        let (_dir, path) = write_manifest(BASIC);
        let manifest = with_env(&[("DEV_TOKEN", "super-secret-value")], || {
            load(&path, &LoaderOptions::default())
        })
        .unwrap();
        assert!(!format!("{manifest:?}").contains("super-secret-value"));
    }
}
