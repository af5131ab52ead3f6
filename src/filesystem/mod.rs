//! In-memory file tree of directories and files addressed by paths.
//!
//! This module provides a tree-like structure to represent filesystems,
//! where nodes can be either directories (that can contain other nodes)
//! or files (which hold opaque bytes), together with a checker that
//! re-verifies the tree's structural rules independently of the engine.

mod checker;
mod node;
mod tree;

pub use checker::{CheckerError, TreeChecker};
pub use node::{Node, NodeError, NodeId, NodeKind, NodeStore, NodeType};
pub use tree::{FileTree, NodeStat, TreeConfig, TreeError};
