//! A small line-oriented language for exercising a file tree.
//!
//! Each non-empty line is one command (`mkdir 1root/2child`, `touch a/f text`,
//! `stat a/f`, ...). An `expect` line asserts the outcome of the command
//! before it, which makes scripts usable as pass/fail self tests.

mod command;
mod runner;

pub use command::{Command, CommandParseError};
pub use runner::{Outcome, RunSummary, ScriptError, ScriptRunner};
