//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mpas - bootstrap a GitOps management repository
///
/// Installs versioned bootstrap components into a management repository and
/// the cluster it is synced to.
#[derive(Parser, Debug)]
#[command(
    name = "mpas",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Bootstrap a GitOps management repository from versioned components",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  mpas bootstrap --config mpas.yaml\n    \
                  mpas resolve --registry ./components ocm.software/mpas/flux '>=2.0.0'\n    \
                  mpas version"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install every configured component
    Bootstrap(BootstrapArgs),

    /// Print the version a constraint resolves to
    Resolve(ResolveArgs),

    /// Show version information
    Version,
}

/// Arguments for the bootstrap command
#[derive(Parser, Debug)]
pub struct BootstrapArgs {
    /// Configuration file
    #[arg(long, short = 'c', default_value = "mpas.yaml")]
    pub config: PathBuf,

    /// Token for the management repository, overrides the configuration
    #[arg(long, env = "MPAS_GIT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Component archive root, overrides the configuration
    #[arg(long, short = 'r')]
    pub registry: Option<PathBuf>,
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Component archive root
    #[arg(long, short = 'r')]
    pub registry: PathBuf,

    /// Component name, e.g. ocm.software/mpas/flux
    pub component: String,

    /// Version constraint, e.g. ">=2.0.0" or "v0.1.x"
    pub constraint: String,
}
