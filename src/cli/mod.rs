pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{BuildArgs, CliArgs, Commands, DepsArgs, DiscoverArgs, SummaryArgs, VersionArgs};
pub use output::OutputFormat;
