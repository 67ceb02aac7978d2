use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::output::OutputFormat;

/// Service discovery and dependency resolution for multi-service builds
#[derive(Parser, Debug)]
#[command(
    name = "forge",
    about = "Service discovery and dependency resolution for multi-service builds",
    version,
    long_about = "forge walks a directory tree to discover services (directories marked \
                  by a service.yaml descriptor), resolves their declared dependencies \
                  across sibling repositories, and computes deterministic content-derived \
                  versions used for image tagging and build caching."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Increase verbosity")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Workspace base directory (defaults to the current directory)"
    )]
    pub base: Option<PathBuf>,

    #[arg(long, global = true, help = "Branch override for profile selection")]
    pub branch: Option<String>,

    #[arg(long, global = true, help = "Profile override, skips branch matching")]
    pub profile: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Discover services under a directory",
        long_about = "Walks the directory tree, applying .gitignore/.forgeignore rules, \
                      and lists every discovered service.\n\n\
                      Examples:\n  \
                      forge discover\n  \
                      forge discover ./services --format json"
    )]
    Discover(DiscoverArgs),

    #[command(
        about = "Resolve the transitive dependencies of target services",
        long_about = "Computes the dependency closure for the given service names, \
                      fetching missing dependencies from sibling repositories when \
                      they cannot be found locally.\n\n\
                      Examples:\n  \
                      forge deps frontend\n  \
                      forge deps frontend billing --format json"
    )]
    Deps(DepsArgs),

    #[command(
        about = "Build a service's container images",
        long_about = "Builds every container of the named service through the docker CLI, \
                      choosing the incremental rebuild path when the container declares a \
                      rebuild spec."
    )]
    Build(BuildArgs),

    #[command(about = "Print the version identifier of a service")]
    Version(VersionArgs),

    #[command(about = "Print the reporting summary of a service as JSON")]
    Summary(SummaryArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct DiscoverArgs {
    #[arg(
        value_name = "PATH",
        help = "Directory to search (defaults to the workspace base)"
    )]
    pub path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct DepsArgs {
    #[arg(value_name = "SERVICE", required = true, help = "Target service names")]
    pub targets: Vec<String>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(value_name = "SERVICE", help = "Service name")]
    pub name: String,
}

#[derive(Parser, Debug, Clone)]
pub struct VersionArgs {
    #[arg(value_name = "SERVICE", help = "Service name")]
    pub name: String,
}

#[derive(Parser, Debug, Clone)]
pub struct SummaryArgs {
    #[arg(value_name = "SERVICE", help = "Service name")]
    pub name: String,
}
