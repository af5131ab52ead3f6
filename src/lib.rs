//! An in-memory file tree: directories and files addressed by slash-delimited
//! paths, with an independent checker for the tree's structural invariants.

#![allow(clippy::enum_variant_names)]

pub mod application;
pub mod cli;
pub mod filesystem;
pub mod path;
pub mod script;

pub use filesystem::{FileTree, NodeStat, TreeChecker, TreeConfig, TreeError};
pub use path::{FtPath, PathError};
