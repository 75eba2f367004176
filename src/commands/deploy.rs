//! The deploy command: manifest → projects → sorted parallel deployment.

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cancel::CancelToken;
use crate::cli::{DeployOpts, GlobalOpts};
use crate::client::ClientSet;
use crate::client::transport::{HttpTransport, UreqTransport};
use crate::deploy::{DeployOptions, deploy_environment};
use crate::error::{EngineError, EnvironmentDeploymentErrors};
use crate::logging::{BufferedLog, EnvironmentStatus, Log, Logger};
use crate::manifest::EnvironmentDefinition;
use crate::model::{Config, ConfigType};
use crate::{features, manifest, project};

/// Run the deploy command.
///
/// # Errors
///
/// Returns the aggregated per-environment errors when any environment
/// failed, or the loader/validation error that stopped the run.
pub fn run(global: &GlobalOpts, opts: &DeployOpts, log: &Arc<Logger>) -> Result<()> {
    let version = option_env!("MONCFG_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    log.info(&format!("moncfg {version}"));

    log.stage("Loading manifest");
    let mut manifest = manifest::load(&opts.manifest, &super::loader_options(global))?;
    if !opts.projects.is_empty() {
        manifest
            .projects
            .retain(|name, _| opts.projects.contains(name));
        anyhow::ensure!(
            !manifest.projects.is_empty(),
            "no project matched the requested names: {}",
            opts.projects.join(",")
        );
    }
    log.info(&format!(
        "manifest: {} projects, {} environments",
        manifest.projects.len(),
        manifest.environments.len()
    ));

    log.stage("Loading projects");
    let projects = project::load_projects(&manifest)?;

    let cancel = CancelToken::new();
    cancel.install_ctrlc_handler();
    let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::default());

    let deploy_options = DeployOptions {
        continue_on_error: opts.continue_on_error,
        dry_run: opts.dry_run,
    };
    let automation_enabled = features::automation_enabled();

    let environments: Vec<&EnvironmentDefinition> = manifest.environments.values().collect();
    let max_concurrent = opts
        .max_concurrent
        .unwrap_or_else(features::max_concurrent_deploys)
        .max(1);

    let mut aggregate = EnvironmentDeploymentErrors::new();
    if environments.len() > 1 && max_concurrent > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrent.min(environments.len()))
            .build()
            .context("building deployment thread pool")?;
        let results: Vec<Result<EnvironmentDeploymentErrors, EngineError>> = pool.install(|| {
            use rayon::prelude::*;
            environments
                .par_iter()
                .map(|environment| {
                    log.notify_environment_start(&environment.name);
                    let buffered = BufferedLog::new(Arc::clone(log));
                    let errors = deploy_to_environment(
                        environment,
                        &projects,
                        &transport,
                        &cancel,
                        deploy_options,
                        automation_enabled,
                        &buffered,
                    );
                    buffered.flush_and_complete(&environment.name);
                    errors
                })
                .collect()
        });
        for result in results {
            aggregate.merge(result?);
        }
    } else {
        for environment in environments {
            aggregate.merge(deploy_to_environment(
                environment,
                &projects,
                &transport,
                &cancel,
                deploy_options,
                automation_enabled,
                log.as_ref(),
            )?);
        }
    }

    log.print_summary();

    if aggregate.is_empty() {
        Ok(())
    } else {
        Err(aggregate.into())
    }
}

/// Deploy all loaded projects to one environment, returning its failures.
///
/// Sorter errors (cycles, dangling references) abort the whole run — they
/// are structural, not environment-specific.
fn deploy_to_environment(
    environment: &EnvironmentDefinition,
    projects: &std::collections::BTreeMap<String, project::Project>,
    transport: &Arc<dyn HttpTransport>,
    cancel: &CancelToken,
    options: DeployOptions,
    automation_enabled: bool,
    log: &dyn Log,
) -> Result<EnvironmentDeploymentErrors, EngineError> {
    let mut configs: Vec<Config> = projects
        .values()
        .flat_map(|p| p.configs_for(&environment.name))
        .collect();

    if !automation_enabled {
        let before = configs.len();
        configs.retain(|c| !matches!(c.type_, ConfigType::Automation { .. }));
        if configs.len() < before {
            log.warn(&format!(
                "{} automation configs skipped: automation is disabled via {}",
                before - configs.len(),
                features::AUTOMATION_VAR
            ));
        }
    }

    let clients = ClientSet::for_environment(environment, Arc::clone(transport), cancel.clone());
    let result = deploy_environment(environment, configs, &clients, log, cancel, options)?;

    let mut aggregate = EnvironmentDeploymentErrors::new();
    if result.is_success() {
        let status = if options.dry_run {
            EnvironmentStatus::DryRun
        } else {
            EnvironmentStatus::Ok
        };
        log.record_environment(
            &environment.name,
            status,
            Some(&format!("{} configs", result.context.len())),
        );
    } else {
        log.record_environment(
            &environment.name,
            EnvironmentStatus::Failed,
            Some(&format!("{} errors", result.errors.len())),
        );
        for error in result.errors {
            aggregate.push(error);
        }
    }
    Ok(aggregate)
}
