use std::path::PathBuf;

use crate::cli::Cli;
use crate::filesystem::TreeConfig;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub script: Option<PathBuf>,
    pub tree: TreeConfig,
    pub check_after_mutation: bool,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            script: cli.script,
            tree: TreeConfig {
                max_nodes: cli.max_nodes,
            },
            check_after_mutation: !cli.no_check,
        }
    }
}
