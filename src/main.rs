//! Configuration-as-code deployment engine binary entry point.
use clap::Parser;
use moncfg_cli::error::EnvironmentDeploymentErrors;
use moncfg_cli::{cli, commands, logging};

fn main() {
    enable_ansi_support::enable_ansi_support().ok(); // best-effort; no-op on non-Windows
    let args = cli::Cli::parse();
    let command_name = match &args.command {
        cli::Command::Deploy(_) => "deploy",
        cli::Command::Delete(_) => "delete",
        cli::Command::Purge(_) => "purge",
        cli::Command::Download(_) => "download",
        cli::Command::Version => "version",
    };
    logging::init_subscriber(args.verbose, command_name);
    let log = std::sync::Arc::new(logging::Logger::new(command_name));

    let result = match args.command {
        cli::Command::Deploy(opts) => commands::deploy::run(&args.global, &opts, &log),
        cli::Command::Delete(opts) => commands::delete::run(&args.global, &opts, &log),
        cli::Command::Purge(opts) => commands::purge::run(&args.global, &opts, &log),
        cli::Command::Download(opts) => commands::download::run(&args.global, &opts, &log),
        cli::Command::Version => {
            commands::version::run();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("\x1b[31mError: {e:#}\x1b[0m");
        // Deployment failures exit 1; loader/validation failures exit 2.
        let code = if e.downcast_ref::<EnvironmentDeploymentErrors>().is_some()
            || log.has_failures()
        {
            1
        } else {
            2
        };
        std::process::exit(code);
    }
}
