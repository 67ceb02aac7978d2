use forge::cli::handlers::{
    handle_build, handle_deps, handle_discover, handle_summary, handle_version,
};
use forge::cli::{CliArgs, Commands};
use forge::util::logging::{self, parse_level, LoggingConfig};
use forge::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("forge v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Discover(discover_args) => handle_discover(&args, discover_args),
        Commands::Deps(deps_args) => handle_deps(&args, deps_args),
        Commands::Build(build_args) => handle_build(&args, build_args),
        Commands::Version(version_args) => handle_version(&args, version_args),
        Commands::Summary(summary_args) => handle_summary(&args, summary_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str).unwrap_or_else(|| {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        })
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        env::var("FORGE_LOG_LEVEL")
            .ok()
            .and_then(|s| parse_level(&s))
            .unwrap_or(Level::INFO)
    };

    logging::init_logging(LoggingConfig::with_level(level));
}
