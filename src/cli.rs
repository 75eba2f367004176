use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "moncfg",
    about = "Monitoring configuration-as-code deployment engine",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Restrict to specific environments
    #[arg(short = 'e', long = "environment", global = true, value_delimiter = ',')]
    pub environments: Vec<String>,

    /// Restrict to specific environment groups
    #[arg(short = 'g', long = "group", global = true, value_delimiter = ',')]
    pub groups: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy the declared configuration to the selected environments
    Deploy(DeployOpts),
    /// Delete the objects named by a delete file
    Delete(DeleteOpts),
    /// Delete every object of every known kind (dangerous)
    Purge(PurgeOpts),
    /// Reconstruct a project from a live environment
    Download(DownloadOpts),
    /// Print version information
    Version,
}

#[derive(Parser, Debug, Clone)]
pub struct DeployOpts {
    /// Path to the manifest file
    pub manifest: PathBuf,

    /// Deploy only these projects
    #[arg(short = 'p', long = "project", value_delimiter = ',')]
    pub projects: Vec<String>,

    /// Preview the deployment without issuing requests
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Keep deploying independent configs after a failure
    #[arg(short = 'c', long)]
    pub continue_on_error: bool,

    /// Maximum environments deployed in parallel
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteOpts {
    /// Path to the manifest file
    pub manifest: PathBuf,

    /// Path to the delete file
    #[arg(long = "file", default_value = "delete.yaml")]
    pub file: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct PurgeOpts {
    /// Path to the manifest file
    pub manifest: PathBuf,

    /// Confirm that every object in the selected environments may be deleted
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DownloadOpts {
    /// Path to the manifest file
    pub manifest: PathBuf,

    /// Name of the project to create
    #[arg(short = 'p', long = "project", default_value = "downloaded")]
    pub project: String,

    /// Classic APIs to download (default: all downloadable APIs)
    #[arg(long = "api", value_delimiter = ',')]
    pub apis: Vec<String>,

    /// Settings schemas to download (implies downloading settings)
    #[arg(long = "settings-schema", value_delimiter = ',')]
    pub settings_schemas: Vec<String>,

    /// Download all settings schemas
    #[arg(long)]
    pub all_settings: bool,

    /// Download platform kinds (automation, documents, segments)
    #[arg(long)]
    pub platform: bool,

    /// Output folder for the downloaded project
    #[arg(short = 'o', long, default_value = "download")]
    pub output: PathBuf,
}
