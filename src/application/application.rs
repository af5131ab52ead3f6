use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::application::RuntimeConfig;
use crate::script::{RunSummary, ScriptError, ScriptRunner};

pub struct Application;

impl Application {
    pub fn run(
        app_config: impl Into<RuntimeConfig>,
        out: impl Write,
    ) -> Result<RunSummary, ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        debug!("Runtime config: {:?}", app_config);

        let script = match &app_config.script {
            Some(path) => Self::read_script(path)?,
            None => {
                let mut script = String::new();
                std::io::stdin()
                    .read_to_string(&mut script)
                    .context(StdinSnafu)?;
                script
            }
        };

        let mut runner = ScriptRunner::new(app_config.tree, app_config.check_after_mutation, out);
        let summary = runner.run_script(&script).context(RunSnafu)?;
        info!(
            "Ran {} command(s): {} expectation(s) met, {} failed, {} invariant failure(s)",
            summary.commands,
            summary.expectations_met,
            summary.expectations_failed,
            summary.invariant_failures
        );

        ensure!(
            summary.is_success(),
            UnmetExpectationsSnafu {
                failed: summary.expectations_failed,
                invalid: summary.invariant_failures,
            }
        );
        Ok(summary)
    }

    fn read_script(path: &Path) -> Result<String, ApplicationError> {
        debug!("Reading script file: {}", path.display());
        std::fs::read_to_string(path).context(ReadSnafu {
            path: path.to_path_buf(),
        })
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Failed to read the script file: {}", path.display()))]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to read the script from standard input"))]
    StdinError { source: std::io::Error },
    #[snafu(display("Critical failure encountered while running the script"))]
    RunError { source: ScriptError },
    #[snafu(display(
        "{} expectation(s) failed and {} invariant check(s) failed",
        failed,
        invalid
    ))]
    UnmetExpectations { failed: usize, invalid: usize },
}
