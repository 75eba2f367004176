//! The download command: reconstruct a project from one live environment.

use std::sync::Arc;

use anyhow::Result;

use crate::cancel::CancelToken;
use crate::cli::{DownloadOpts, GlobalOpts};
use crate::client::ClientSet;
use crate::client::transport::{HttpTransport, UreqTransport};
use crate::download::{DownloadOptions, download_environment, write_project};
use crate::logging::Logger;
use crate::manifest;

/// Run the download command.
///
/// Exactly one environment must be selected; use `-e` when the manifest
/// declares several.
///
/// # Errors
///
/// Returns an error when the manifest cannot be loaded, the environment
/// selection is ambiguous, or the download/persistence fails.
pub fn run(global: &GlobalOpts, opts: &DownloadOpts, log: &Arc<Logger>) -> Result<()> {
    log.stage("Loading manifest");
    let manifest = manifest::load(&opts.manifest, &super::loader_options(global))?;
    anyhow::ensure!(
        manifest.environments.len() == 1,
        "download targets exactly one environment; {} are selected (use -e to narrow down)",
        manifest.environments.len()
    );
    let Some(environment) = manifest.environments.values().next() else {
        anyhow::bail!("no environment selected");
    };

    let cancel = CancelToken::new();
    cancel.install_ctrlc_handler();
    let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::default());
    let clients = ClientSet::for_environment(environment, transport, cancel);

    let options = DownloadOptions {
        project_name: opts.project.clone(),
        apis: opts.apis.clone(),
        settings_schemas: opts.settings_schemas.clone(),
        include_settings: opts.all_settings || !opts.settings_schemas.is_empty(),
        include_platform: opts.platform,
    };

    log.stage(&format!(
        "Downloading from environment '{}'",
        environment.name
    ));
    let project = download_environment(&clients, &options, log.as_ref())?;

    log.stage("Writing project");
    let manifest_path = write_project(&opts.output, &project, environment)?;
    log.info(&format!(
        "wrote {} configs to {} (manifest: {})",
        project.configs.len(),
        opts.output.display(),
        manifest_path.display()
    ));
    Ok(())
}
