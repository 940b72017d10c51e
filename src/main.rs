//! mpas - bootstrap a GitOps management repository
//!
//! Resolves versioned bootstrap components, commits their manifests to a
//! management repository and waits for the cluster to converge.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mpas_bootstrap::cancel::CancelToken;
use mpas_bootstrap::cli::{Cli, Commands};
use mpas_bootstrap::commands;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, stopping...");
        handler_token.cancel();
    }) {
        tracing::warn!(error = %e, "failed to set interrupt handler");
    }

    let result = match cli.command {
        Commands::Bootstrap(args) => commands::bootstrap::run(args, &cancel),
        Commands::Resolve(args) => commands::resolve::run(args),
        Commands::Version => commands::version::run(),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}
