#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the deployment pipeline.
//!
//! These run the full chain — project loading, dependency sorting,
//! parameter resolution, template rendering, and idempotent upserts —
//! against the in-memory fake platform.

mod common;

use std::sync::Arc;

use common::{FakePlatform, ProjectFixture, environment, manifest_for};
use moncfg_cli::cancel::CancelToken;
use moncfg_cli::client::ClientSet;
use moncfg_cli::client::transport::Method;
use moncfg_cli::deploy::{DeployOptions, deploy_environment};
use moncfg_cli::logging::Logger;
use moncfg_cli::model::{Config, Coordinate};
use moncfg_cli::project;

const ZONES_PATH: &str = "/api/config/v1/managementZones";
const PROFILES_PATH: &str = "/api/config/v1/alertingProfiles";

fn deploy(
    fake: &Arc<FakePlatform>,
    env: &moncfg_cli::manifest::EnvironmentDefinition,
    configs: Vec<Config>,
    options: DeployOptions,
) -> moncfg_cli::deploy::EnvironmentDeployment {
    let clients = ClientSet::for_environment(
        env,
        Arc::clone(fake) as Arc<dyn moncfg_cli::client::transport::HttpTransport>,
        CancelToken::new(),
    );
    let log = Logger::new("test");
    deploy_environment(env, configs, &clients, &log, &CancelToken::new(), options)
        .expect("sorting should succeed")
}

/// The infra project: a management zone and an alerting profile that
/// references the zone by id.
fn infra_project() -> ProjectFixture {
    ProjectFixture::new(&[
        (
            "zones/config.yaml",
            r#"
configs:
  - id: main-zone
    config:
      name: Main zone
      template: zone.json
    type:
      api: management-zone
"#,
        ),
        ("zones/zone.json", r#"{"name": "{{ name }}", "rules": []}"#),
        (
            "profiles/config.yaml",
            r#"
configs:
  - id: on-call
    config:
      name: On call
      template: profile.json
      parameters:
        zoneId: ["infra", "management-zone", "main-zone", "id"]
    type:
      api: alerting-profile
"#,
        ),
        (
            "profiles/profile.json",
            r#"{"name": "{{ name }}", "managementZoneId": "{{ zoneId }}"}"#,
        ),
    ])
}

/// The services project: two configs depending on the infra project.
fn services_project() -> ProjectFixture {
    ProjectFixture::new(&[
        (
            "tags/config.yaml",
            r#"
configs:
  - id: svc-tag
    config:
      name: Service tag
      template: tag.json
      parameters:
        zoneId: ["infra", "management-zone", "main-zone", "id"]
    type:
      api: auto-tag
  - id: svc-tag-2
    config:
      name: Second tag
      template: tag.json
      parameters:
        zoneId: ["infra", "management-zone", "main-zone", "id"]
    type:
      api: auto-tag
"#,
        ),
        ("tags/tag.json", r#"{"name": "{{ name }}", "zone": "{{ zoneId }}"}"#),
    ])
}

// ---------------------------------------------------------------------------
// Scenario: two environments, two projects, cross-project references
// ---------------------------------------------------------------------------

#[test]
fn two_projects_deploy_to_two_environments_in_dependency_order() {
    let infra = infra_project();
    let services = services_project();
    let envs = [environment("dev", false), environment("stage", false)];
    let manifest = manifest_for(
        &[("infra", infra.path()), ("services", services.path())],
        &envs,
    );
    let projects = project::load_projects(&manifest).expect("projects load");

    for env in &envs {
        let fake = Arc::new(FakePlatform::new());
        let configs: Vec<Config> = projects
            .values()
            .flat_map(|p| p.configs_for(&env.name))
            .collect();
        assert_eq!(configs.len(), 4);

        let result = deploy(&fake, env, configs, DeployOptions::default());
        assert!(result.is_success(), "errors: {:?}", result.errors);
        assert_eq!(result.context.len(), 4, "4 resolved entities per environment");

        // The zone deployed before its dependents: the profile rendered the
        // zone's real id.
        let zone_id = result
            .context
            .get(&Coordinate::new("infra", "management-zone", "main-zone"))
            .unwrap()
            .id()
            .unwrap()
            .to_string();
        assert_eq!(fake.classic_count(ZONES_PATH), 1);
        assert_eq!(fake.classic_count(PROFILES_PATH), 1);
        let requests = fake.requests();
        let zone_create = requests
            .iter()
            .position(|(m, p)| *m == Method::Post && p == ZONES_PATH)
            .expect("zone created");
        let profile_create = requests
            .iter()
            .position(|(m, p)| *m == Method::Post && p == PROFILES_PATH)
            .expect("profile created");
        assert!(
            zone_create < profile_create,
            "infra config must deploy before its dependent"
        );
        assert!(!zone_id.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Idempotence: a second run updates instead of creating
// ---------------------------------------------------------------------------

#[test]
fn second_deploy_converges_with_puts_only() {
    let infra = infra_project();
    let envs = [environment("dev", false)];
    let manifest = manifest_for(&[("infra", infra.path())], &envs);
    let projects = project::load_projects(&manifest).expect("projects load");
    let fake = Arc::new(FakePlatform::new());

    let first = deploy(
        &fake,
        &envs[0],
        projects["infra"].configs_for("dev"),
        DeployOptions::default(),
    );
    assert!(first.is_success());
    let creates_after_first = fake.count_method(Method::Post);
    assert_eq!(creates_after_first, 2);

    let second = deploy(
        &fake,
        &envs[0],
        projects["infra"].configs_for("dev"),
        DeployOptions::default(),
    );
    assert!(second.is_success());
    assert_eq!(
        fake.count_method(Method::Post),
        creates_after_first,
        "re-running an already-converged environment must not POST"
    );
    assert_eq!(fake.classic_count(ZONES_PATH), 1, "no duplicate objects");
    assert_eq!(fake.classic_count(PROFILES_PATH), 1);
}

// ---------------------------------------------------------------------------
// Continue-on-error
// ---------------------------------------------------------------------------

#[test]
fn continue_on_error_deploys_independent_configs() {
    // "broken" fails to render valid JSON; "healthy" is independent.
    let fixture = ProjectFixture::new(&[
        (
            "config.yaml",
            r#"
configs:
  - id: broken
    config:
      name: Broken
      template: broken.json
    type:
      api: auto-tag
  - id: healthy
    config:
      name: Healthy
      template: ok.json
    type:
      api: auto-tag
"#,
        ),
        ("broken.json", r#"{"name": "{{ name }}", }"#),
        ("ok.json", r#"{"name": "{{ name }}"}"#),
    ]);
    let envs = [environment("dev", false)];
    let manifest = manifest_for(&[("p", fixture.path())], &envs);
    let projects = project::load_projects(&manifest).expect("projects load");
    let fake = Arc::new(FakePlatform::new());

    let result = deploy(
        &fake,
        &envs[0],
        projects["p"].configs_for("dev"),
        DeployOptions {
            continue_on_error: true,
            dry_run: false,
        },
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(
        fake.classic_names("/api/config/v1/autoTags"),
        vec!["Healthy"],
        "the independent config still deployed"
    );
}

#[test]
fn strict_mode_stops_after_first_failure() {
    let fixture = ProjectFixture::new(&[
        (
            "config.yaml",
            r#"
configs:
  - id: a-broken
    config:
      name: Broken
      template: broken.json
    type:
      api: auto-tag
  - id: b-healthy
    config:
      name: Healthy
      template: ok.json
    type:
      api: auto-tag
"#,
        ),
        ("broken.json", r#"{"oops": }"#),
        ("ok.json", r#"{"name": "{{ name }}"}"#),
    ]);
    let envs = [environment("dev", false)];
    let manifest = manifest_for(&[("p", fixture.path())], &envs);
    let projects = project::load_projects(&manifest).expect("projects load");
    let fake = Arc::new(FakePlatform::new());

    let result = deploy(
        &fake,
        &envs[0],
        projects["p"].configs_for("dev"),
        DeployOptions::default(),
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(fake.classic_count("/api/config/v1/autoTags"), 0);
}

// ---------------------------------------------------------------------------
// Settings with a cross-project scope reference
// ---------------------------------------------------------------------------

#[test]
fn settings_scope_can_reference_another_project() {
    let proj2 = ProjectFixture::new(&[
        (
            "config.yaml",
            r#"
configs:
  - id: cfg-id
    config:
      name: Scope holder
      template: zone.json
    type:
      api: management-zone
"#,
        ),
        ("zone.json", r#"{"name": "{{ name }}"}"#),
    ]);
    let proj1 = ProjectFixture::new(&[
        (
            "config.yaml",
            r#"
configs:
  - id: settings-cfg
    config:
      name: Settings over zone
      template: value.json
    type:
      settings:
        schema: "schema-x"
        scope: ["proj2", "management-zone", "cfg-id", "id"]
"#,
        ),
        ("value.json", r#"{"enabled": true}"#),
    ]);
    let envs = [environment("dev", false)];
    let manifest = manifest_for(&[("proj1", proj1.path()), ("proj2", proj2.path())], &envs);
    let projects = project::load_projects(&manifest).expect("projects load");
    let fake = Arc::new(FakePlatform::new());

    let configs: Vec<Config> = projects
        .values()
        .flat_map(|p| p.configs_for("dev"))
        .collect();
    let result = deploy(&fake, &envs[0], configs, DeployOptions::default());
    assert!(result.is_success(), "errors: {:?}", result.errors);

    let zone_id = result
        .context
        .get(&Coordinate::new("proj2", "management-zone", "cfg-id"))
        .unwrap()
        .id()
        .unwrap()
        .to_string();
    let settings = fake.settings_objects();
    assert_eq!(settings.len(), 1);
    assert_eq!(
        settings[0]["scope"].as_str(),
        Some(zone_id.as_str()),
        "the settings upsert used the referenced object's resolved id as scope"
    );
}

// ---------------------------------------------------------------------------
// Settings external ids are stable
// ---------------------------------------------------------------------------

#[test]
fn settings_external_id_is_stable_across_runs() {
    let fixture = ProjectFixture::new(&[
        (
            "config.yaml",
            r#"
configs:
  - id: s1
    config:
      name: Settings
      template: v.json
    type:
      settings:
        schema: "builtin:tags"
        scope: environment
"#,
        ),
        ("v.json", r#"{"enabled": true}"#),
    ]);
    let envs = [environment("dev", false)];
    let manifest = manifest_for(&[("p", fixture.path())], &envs);
    let projects = project::load_projects(&manifest).expect("projects load");
    let fake = Arc::new(FakePlatform::new());

    for _ in 0..2 {
        let result = deploy(
            &fake,
            &envs[0],
            projects["p"].configs_for("dev"),
            DeployOptions::default(),
        );
        assert!(result.is_success());
    }
    assert_eq!(
        fake.settings_count(),
        1,
        "the platform de-duplicated on the stable externalId"
    );
}

// ---------------------------------------------------------------------------
// Skip semantics
// ---------------------------------------------------------------------------

#[test]
fn skipped_config_is_recorded_without_requests() {
    let fixture = ProjectFixture::new(&[
        (
            "config.yaml",
            r#"
configs:
  - id: skipped-zone
    config:
      name: Not deployed
      template: zone.json
      skip: true
      originObjectId: existing-zone-1
    type:
      api: management-zone
"#,
        ),
        ("zone.json", r#"{"name": "{{ name }}"}"#),
    ]);
    let envs = [environment("dev", false)];
    let manifest = manifest_for(&[("p", fixture.path())], &envs);
    let projects = project::load_projects(&manifest).expect("projects load");
    let fake = Arc::new(FakePlatform::new());

    let result = deploy(
        &fake,
        &envs[0],
        projects["p"].configs_for("dev"),
        DeployOptions::default(),
    );
    assert!(result.is_success());
    assert!(fake.requests().is_empty(), "skip must not issue requests");

    let entity = result
        .context
        .get(&Coordinate::new("p", "management-zone", "skipped-zone"))
        .unwrap();
    assert!(entity.skipped);
    assert_eq!(
        entity.id(),
        Some("existing-zone-1"),
        "the origin anchor stays resolvable for dependents"
    );
}
