use std::io::Write;

use colored::Colorize;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, warn};

use crate::filesystem::{CheckerError, FileTree, NodeStat, TreeChecker, TreeConfig, TreeError};
use crate::script::command::{Command, CommandParseError};

/// What a single command produced.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Answer(bool),
    Contents(Option<Vec<u8>>),
    Stat(NodeStat),
    Listing(Option<String>),
    Failed(TreeError),
    Invalid(CheckerError),
}

impl Outcome {
    /// The label an `expect` line compares against.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Done | Outcome::Stat(_) => "ok",
            Outcome::Answer(true) => "true",
            Outcome::Answer(false) => "false",
            Outcome::Contents(Some(_)) | Outcome::Listing(Some(_)) => "ok",
            Outcome::Contents(None) | Outcome::Listing(None) => "none",
            Outcome::Failed(error) => error.kind(),
            Outcome::Invalid(_) => "invalid",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub commands: usize,
    pub expectations_met: usize,
    pub expectations_failed: usize,
    pub invariant_failures: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.expectations_failed == 0 && self.invariant_failures == 0
    }
}

/// Drives a [`FileTree`] from a line-oriented script and reports each result.
pub struct ScriptRunner<W: Write> {
    tree: FileTree,
    out: W,
    check_after_mutation: bool,
    last: Option<Outcome>,
    summary: RunSummary,
}

impl<W: Write> ScriptRunner<W> {
    pub fn new(config: TreeConfig, check_after_mutation: bool, out: W) -> Self {
        Self {
            tree: FileTree::with_config(config),
            out,
            check_after_mutation,
            last: None,
            summary: RunSummary::default(),
        }
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn run_script(&mut self, script: &str) -> Result<RunSummary, ScriptError> {
        for (index, line) in script.lines().enumerate() {
            self.run_line(index + 1, line)?;
        }
        Ok(self.summary)
    }

    pub fn run_line(&mut self, line_number: usize, line: &str) -> Result<(), ScriptError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        let command = Command::try_from(trimmed).context(ParseSnafu { line: line_number })?;
        debug!("Line {}: {:?}", line_number, command);

        if let Command::Expect { label } = &command {
            return self.expect(line_number, label);
        }

        let outcome = self.execute(&command);
        self.summary.commands += 1;
        self.report(line_number, trimmed, &outcome)?;

        if self.check_after_mutation && command.is_mutation() {
            if let Err(error) = TreeChecker::check(&self.tree) {
                self.summary.invariant_failures += 1;
                warn!("Invariant violated after line {}: {}", line_number, error);
                writeln!(self.out, "{}: {} {}", line_number, "INVALID".red().bold(), error)
                    .context(OutputSnafu)?;
            }
        }

        self.last = Some(outcome);
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> Outcome {
        let tree = &mut self.tree;
        let done = |result: Result<(), TreeError>| match result {
            Ok(()) => Outcome::Done,
            Err(error) => Outcome::Failed(error),
        };

        match command {
            Command::Init => done(tree.init()),
            Command::Destroy => done(tree.destroy()),
            Command::MakeDirectory { path } => done(tree.insert_directory(path)),
            Command::Touch { path, contents } => {
                done(tree.insert_file(path, contents.clone(), contents.len()))
            }
            Command::RemoveDirectory { path } => done(tree.remove_directory(path)),
            Command::RemoveFile { path } => done(tree.remove_file(path)),
            Command::Cat { path } => Outcome::Contents(tree.get_file_contents(path).map(<[u8]>::to_vec)),
            Command::Write { path, contents } => Outcome::Contents(tree.replace_file_contents(
                path,
                contents.clone(),
                contents.len(),
            )),
            Command::Stat { path } => match tree.stat(path) {
                Ok(stat) => Outcome::Stat(stat),
                Err(error) => Outcome::Failed(error),
            },
            Command::HasDirectory { path } => Outcome::Answer(tree.contains_directory(path)),
            Command::HasFile { path } => Outcome::Answer(tree.contains_file(path)),
            Command::Print => Outcome::Listing(tree.to_tree_string()),
            Command::Check => match TreeChecker::check(tree) {
                Ok(()) => Outcome::Done,
                Err(error) => Outcome::Invalid(error),
            },
            Command::Expect { .. } => Outcome::Done,
        }
    }

    fn report(&mut self, line_number: usize, line: &str, outcome: &Outcome) -> Result<(), ScriptError> {
        let label = match outcome {
            Outcome::Failed(_) | Outcome::Invalid(_) => outcome.label().red(),
            _ => outcome.label().green(),
        };
        write!(self.out, "{}: {} -> {}", line_number, line, label).context(OutputSnafu)?;

        match outcome {
            Outcome::Stat(NodeStat::Directory) => write!(self.out, " (directory)"),
            Outcome::Stat(NodeStat::File { size }) => write!(self.out, " (file, {} bytes)", size),
            Outcome::Contents(Some(bytes)) => {
                write!(self.out, " {:?}", String::from_utf8_lossy(bytes))
            }
            Outcome::Failed(error) => write!(self.out, " ({})", error),
            Outcome::Invalid(error) => write!(self.out, " ({})", error),
            _ => Ok(()),
        }
        .context(OutputSnafu)?;
        writeln!(self.out).context(OutputSnafu)?;

        if let Outcome::Listing(Some(listing)) = outcome {
            self.out.write_all(listing.as_bytes()).context(OutputSnafu)?;
        }
        Ok(())
    }

    fn expect(&mut self, line_number: usize, label: &str) -> Result<(), ScriptError> {
        let actual = self
            .last
            .as_ref()
            .map(Outcome::label)
            .context(ExpectWithoutCommandSnafu { line: line_number })?;

        if actual == label {
            self.summary.expectations_met += 1;
            writeln!(self.out, "{}: {} {}", line_number, "PASS".green(), label).context(OutputSnafu)?;
        } else {
            self.summary.expectations_failed += 1;
            warn!(
                "Expectation on line {} failed: expected {}, got {}",
                line_number, label, actual
            );
            writeln!(
                self.out,
                "{}: {} expected {}, got {}",
                line_number,
                "FAIL".red().bold(),
                label,
                actual
            )
            .context(OutputSnafu)?;
        }
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ScriptError {
    #[snafu(display("Failed to parse line {}", line))]
    ParseError {
        line: usize,
        source: CommandParseError,
    },
    #[snafu(display("Line {} has an expect with no command before it", line))]
    ExpectWithoutCommand { line: usize },
    #[snafu(display("Failed to write script output"))]
    OutputError { source: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str) -> (RunSummary, String) {
        colored::control::set_override(false);
        let mut runner = ScriptRunner::new(TreeConfig::default(), true, Vec::new());
        let summary = runner.run_script(script).expect("script runs");
        let output = String::from_utf8(runner.into_output()).expect("utf8 output");
        (summary, output)
    }

    #[test]
    fn client_scenario_meets_every_expectation() {
        let script = r#"
# malformed paths
init
mkdir ""
expect bad-path
mkdir /1root/2child
expect bad-path
mkdir 1root/2child/
expect bad-path
touch 1root//2child
expect bad-path
touch A
expect conflicting-path

mkdir 1root/2child/3gkid
expect ok
has-dir 1root/2child
expect true
touch 1root/2second/3gfile
expect ok
has-file 1root/2second/3gfile
expect true
mkdir 1root/2child/3gkid
expect already-in-tree
touch 1root/2child/3gkid
expect already-in-tree
mkdir 1otherroot
expect conflicting-path
touch 1otherroot/2f
expect conflicting-path
touch 1root/2third
expect ok
mkdir 1root/2third/3nopeD
expect not-a-directory
touch 1root/2third/3nopeF
expect not-a-directory
check
expect ok
"#;
        let (summary, output) = run(script);

        assert!(summary.is_success(), "output:\n{output}");
        assert_eq!(summary.expectations_met, 17);
        assert_eq!(summary.invariant_failures, 0);
    }

    #[test]
    fn bundled_scenario_passes() {
        let (summary, output) = run(include_str!("../../scripts/client_scenario.ft"));

        assert!(summary.is_success(), "output:\n{output}");
        assert_eq!(summary.expectations_failed, 0);
        assert!(summary.expectations_met > 30);
    }

    #[test]
    fn print_lists_files_before_directories() {
        let script = "init\nmkdir r/d\ntouch r/f\nprint\n";
        let (_, output) = run(script);

        assert!(output.ends_with("r\nr/f\nr/d\n"), "output:\n{output}");
    }

    #[test]
    fn contents_and_stat_are_reported() {
        let script = "\
init
mkdir r
touch r/notes hello
cat r/notes
expect ok
write r/notes goodbye
stat r/notes
cat r/missing
expect none
";
        let (summary, output) = run(script);

        assert!(summary.is_success());
        assert!(output.contains("\"hello\""));
        assert!(output.contains("(file, 7 bytes)"));
    }

    #[test]
    fn failed_expectations_are_counted() {
        let (summary, output) = run("init\nmkdir a\nexpect already-in-tree\n");

        assert!(!summary.is_success());
        assert_eq!(summary.expectations_failed, 1);
        assert!(output.contains("FAIL expected already-in-tree, got ok"));
    }

    #[test]
    fn expect_needs_a_previous_command() {
        let mut runner = ScriptRunner::new(TreeConfig::default(), false, Vec::new());

        let result = runner.run_script("# nothing yet\nexpect ok\n");

        assert!(matches!(
            result,
            Err(ScriptError::ExpectWithoutCommand { line: 2 })
        ));
    }

    #[test]
    fn parse_errors_carry_the_line_number() {
        let mut runner = ScriptRunner::new(TreeConfig::default(), false, Vec::new());

        let result = runner.run_script("init\n\nfrobnicate a\n");

        assert!(matches!(result, Err(ScriptError::ParseError { line: 3, .. })));
    }

    #[test]
    fn node_budget_surfaces_memory_errors() {
        colored::control::set_override(false);
        let config = TreeConfig { max_nodes: Some(2) };
        let mut runner = ScriptRunner::new(config, true, Vec::new());

        let summary = runner
            .run_script("init\nmkdir a/b/c\nexpect memory-error\nmkdir a/b\nexpect ok\n")
            .unwrap();

        assert!(summary.is_success());
        assert_eq!(runner.tree().count(), 2);
    }
}
