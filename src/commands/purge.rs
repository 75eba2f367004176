//! The purge command: delete everything, twice gated.

use std::sync::Arc;

use anyhow::Result;

use crate::cancel::CancelToken;
use crate::cli::{GlobalOpts, PurgeOpts};
use crate::client::ClientSet;
use crate::client::transport::{HttpTransport, UreqTransport};
use crate::delete::purge_environment;
use crate::features;
use crate::logging::{EnvironmentStatus, Logger};
use crate::manifest;

/// Run the purge command.
///
/// Requires both the dangerous-commands feature flag and the explicit
/// `--force` flag; the double gate is intentional for a command that
/// deletes every object it can list.
///
/// # Errors
///
/// Returns an error when the gates are not open, the manifest cannot be
/// loaded, or any environment failed.
pub fn run(global: &GlobalOpts, opts: &PurgeOpts, log: &Arc<Logger>) -> Result<()> {
    anyhow::ensure!(
        features::dangerous_commands_enabled(),
        "purge is disabled; set {}=1 to enable dangerous commands",
        features::DANGEROUS_COMMANDS_VAR
    );
    anyhow::ensure!(
        opts.force,
        "purge deletes every object in the selected environments; \
         pass --force to confirm"
    );

    log.stage("Loading manifest");
    let manifest = manifest::load(&opts.manifest, &super::loader_options(global))?;

    let cancel = CancelToken::new();
    cancel.install_ctrlc_handler();
    let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::default());

    let mut failed = 0usize;
    for environment in manifest.environments.values() {
        log.stage(&format!("Purging environment '{}'", environment.name));
        let clients =
            ClientSet::for_environment(environment, Arc::clone(&transport), cancel.clone());
        match purge_environment(&clients, log.as_ref()) {
            Ok(stats) => {
                log.info(&stats.summary());
                log.record_environment(
                    &environment.name,
                    EnvironmentStatus::Ok,
                    Some(&stats.summary()),
                );
            }
            Err(e) => {
                failed += 1;
                log.error(&format!(
                    "purge failed for environment '{}': {e:#}",
                    environment.name
                ));
                log.record_environment(&environment.name, EnvironmentStatus::Failed, None);
            }
        }
    }

    log.print_summary();
    anyhow::ensure!(failed == 0, "{failed} environments failed");
    Ok(())
}
