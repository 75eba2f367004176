//! The delete command: execute a delete plan against every environment.

use std::sync::Arc;

use anyhow::Result;

use crate::cancel::CancelToken;
use crate::cli::{DeleteOpts, GlobalOpts};
use crate::client::ClientSet;
use crate::client::transport::{HttpTransport, UreqTransport};
use crate::delete::{delete_from_environment, load_delete_file};
use crate::logging::{EnvironmentStatus, Logger};
use crate::manifest;

/// Run the delete command.
///
/// Every selected environment processes the full plan; an environment
/// failure is recorded and does not stop the remaining environments.
///
/// # Errors
///
/// Returns an error when the manifest or delete file cannot be loaded, or
/// when any environment failed.
pub fn run(global: &GlobalOpts, opts: &DeleteOpts, log: &Arc<Logger>) -> Result<()> {
    log.stage("Loading manifest");
    let manifest = manifest::load(&opts.manifest, &super::loader_options(global))?;

    log.stage("Loading delete file");
    let plan = load_delete_file(&opts.file)?;
    log.info(&format!(
        "delete plan: {} targets across {} kinds",
        plan.len(),
        plan.entries.len()
    ));

    let cancel = CancelToken::new();
    cancel.install_ctrlc_handler();
    let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::default());

    let mut failed = 0usize;
    for environment in manifest.environments.values() {
        log.stage(&format!("Deleting from environment '{}'", environment.name));
        let clients =
            ClientSet::for_environment(environment, Arc::clone(&transport), cancel.clone());
        match delete_from_environment(&plan, &clients, log.as_ref()) {
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
                    "delete failed for environment '{}': {e:#}",
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
