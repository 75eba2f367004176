//! One module per CLI subcommand.
pub mod delete;
pub mod deploy;
pub mod download;
pub mod purge;
pub mod version;

use crate::cli::GlobalOpts;
use crate::manifest::LoaderOptions;

/// Translate global CLI filters into manifest loader options.
pub(crate) fn loader_options(global: &GlobalOpts) -> LoaderOptions {
    LoaderOptions {
        environment_names: global.environments.clone(),
        environment_groups: global.groups.clone(),
        account_names: Vec::new(),
        require_accounts: false,
    }
}
