use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Runs a file tree script and reports whether every expectation held.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Script to run. Reads standard input when omitted.
    pub script: Option<PathBuf>,
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// Fail node creation once this many nodes are live
    #[clap(long, short = 'n')]
    pub max_nodes: Option<usize>,

    /// Skip the invariant check after each mutating command
    #[clap(long)]
    pub no_check: bool,
}
