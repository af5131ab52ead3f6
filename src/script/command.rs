use snafu::{OptionExt, Snafu, ensure};

use crate::filesystem::TreeError;

/// Outcome labels accepted by `expect`, besides the error kind names.
const PLAIN_LABELS: [&str; 5] = ["ok", "true", "false", "none", "invalid"];

/// One line of a tree script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init,
    Destroy,
    MakeDirectory { path: String },
    Touch { path: String, contents: Vec<u8> },
    RemoveDirectory { path: String },
    RemoveFile { path: String },
    Cat { path: String },
    Write { path: String, contents: Vec<u8> },
    Stat { path: String },
    HasDirectory { path: String },
    HasFile { path: String },
    Print,
    Check,
    Expect { label: String },
}

impl Command {
    /// Whether running the command may change the tree.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Init
                | Command::Destroy
                | Command::MakeDirectory { .. }
                | Command::Touch { .. }
                | Command::RemoveDirectory { .. }
                | Command::RemoveFile { .. }
                | Command::Write { .. }
        )
    }
}

impl TryFrom<&str> for Command {
    type Error = CommandParseError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim_start()),
            None => (line, ""),
        };

        let command = match name {
            "init" => no_argument(name, rest, Command::Init)?,
            "destroy" => no_argument(name, rest, Command::Destroy)?,
            "print" => no_argument(name, rest, Command::Print)?,
            "check" => no_argument(name, rest, Command::Check)?,
            "mkdir" => Command::MakeDirectory {
                path: single_path(name, rest)?,
            },
            "rmdir" => Command::RemoveDirectory {
                path: single_path(name, rest)?,
            },
            "rm" => Command::RemoveFile {
                path: single_path(name, rest)?,
            },
            "cat" => Command::Cat {
                path: single_path(name, rest)?,
            },
            "stat" => Command::Stat {
                path: single_path(name, rest)?,
            },
            "has-dir" => Command::HasDirectory {
                path: single_path(name, rest)?,
            },
            "has-file" => Command::HasFile {
                path: single_path(name, rest)?,
            },
            "touch" => {
                let (path, text) = path_and_text(name, rest)?;
                Command::Touch {
                    path,
                    contents: text.into_bytes(),
                }
            }
            "write" => {
                let (path, text) = path_and_text(name, rest)?;
                Command::Write {
                    path,
                    contents: text.into_bytes(),
                }
            }
            "expect" => {
                let label = single_path(name, rest)?;
                ensure!(
                    PLAIN_LABELS.contains(&label.as_str())
                        || TreeError::KINDS.contains(&label.as_str()),
                    UnknownLabelSnafu { label }
                );
                Command::Expect { label }
            }
            _ => return UnknownCommandSnafu { name }.fail(),
        };

        Ok(command)
    }
}

fn no_argument(name: &str, rest: &str, command: Command) -> Result<Command, CommandParseError> {
    ensure!(rest.is_empty(), UnexpectedArgumentSnafu { command: name });
    Ok(command)
}

/// Paths are taken verbatim so malformed ones reach the tree untouched.
fn single_path(name: &str, rest: &str) -> Result<String, CommandParseError> {
    let mut words = rest.split_whitespace();
    let path = words
        .next()
        .context(MissingArgumentSnafu { command: name })?;
    ensure!(
        words.next().is_none(),
        UnexpectedArgumentSnafu { command: name }
    );
    Ok(unquote(path))
}

fn path_and_text(name: &str, rest: &str) -> Result<(String, String), CommandParseError> {
    ensure!(!rest.is_empty(), MissingArgumentSnafu { command: name });
    let (path, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Ok((unquote(path), text.trim_start().to_string()))
}

/// `""` stands for the empty path, which whitespace splitting cannot express.
fn unquote(path: &str) -> String {
    if path == EMPTY_PATH_TOKEN {
        String::new()
    } else {
        path.to_string()
    }
}

const EMPTY_PATH_TOKEN: &str = "\"\"";

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum CommandParseError {
    #[snafu(display("Unknown command '{}'", name))]
    UnknownCommand { name: String },
    #[snafu(display("Command '{}' is missing its argument", command))]
    MissingArgument { command: String },
    #[snafu(display("Command '{}' got unexpected arguments", command))]
    UnexpectedArgument { command: String },
    #[snafu(display("Unknown outcome '{}' in expect", label))]
    UnknownLabel { label: String },
}
