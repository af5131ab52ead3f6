//! Independent verification of the structural rules a [`FileTree`] promises.
//!
//! The checker only reads the tree. It is meant to be run after mutations
//! (typically in tests or behind a debug flag) and reports the first rule it
//! finds broken together with the offending path.

use std::cmp::Ordering;

use snafu::{OptionExt, Snafu, ensure};
use tracing::debug;

use crate::filesystem::node::{Node, NodeId, NodeStore};
use crate::filesystem::tree::FileTree;

pub struct TreeChecker;

impl TreeChecker {
    pub fn check(tree: &FileTree) -> Result<(), CheckerError> {
        Self::check_state(tree.is_initialized(), tree.root(), tree.count())?;

        let reachable = match tree.root() {
            Some(root) => Self::check_nodes(tree.nodes(), root)?,
            None => 0,
        };
        ensure!(
            reachable == tree.count(),
            CountMismatchSnafu {
                count: tree.count(),
                reachable,
            }
        );

        debug!("Tree invariants hold for {} node(s)", reachable);
        Ok(())
    }

    /// Consistency between the initialized flag, the root and the count.
    fn check_state(
        initialized: bool,
        root: Option<NodeId>,
        count: usize,
    ) -> Result<(), CheckerError> {
        if !initialized {
            ensure!(count == 0, UninitializedWithCountSnafu { count });
            ensure!(root.is_none(), UninitializedWithRootSnafu);
        }
        if count > 0 {
            ensure!(root.is_some(), CountWithoutRootSnafu { count });
        } else {
            ensure!(root.is_none(), RootWithoutCountSnafu);
        }
        Ok(())
    }

    /// Validates every node reachable from `root` and returns how many there are.
    fn check_nodes(nodes: &NodeStore, root: NodeId) -> Result<usize, CheckerError> {
        let root_node = nodes.get(root).context(DanglingSnafu {
            id: root,
            referrer: "tree root".to_string(),
        })?;
        ensure!(
            root_node.parent().is_none(),
            RootHasParentSnafu {
                path: root_node.path().to_string(),
            }
        );

        // Every edge checked below goes exactly one level deeper and is
        // confirmed by the child's back-reference, so each node is visited once.
        let mut reachable = 0;
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            reachable += 1;
            let node = nodes.get(id).context(DanglingSnafu {
                id,
                referrer: "traversal".to_string(),
            })?;
            Self::check_node(nodes, id, node)?;
            pending.extend(node.children().map(|(_, child)| child));
        }

        Ok(reachable)
    }

    fn check_node(nodes: &NodeStore, id: NodeId, node: &Node) -> Result<(), CheckerError> {
        let path = node.path();
        let depth = path.depth();

        match node.parent() {
            None => {
                ensure!(
                    depth == 1,
                    MissingParentSnafu {
                        path: path.to_string(),
                    }
                );
            }
            Some(parent_id) => {
                ensure!(
                    depth > 1,
                    UnexpectedParentSnafu {
                        path: path.to_string(),
                    }
                );
                let parent = nodes.get(parent_id).context(DanglingSnafu {
                    id: parent_id,
                    referrer: path.to_string(),
                })?;
                ensure!(
                    parent.child_count() > 0,
                    ChildlessParentSnafu {
                        parent: parent.path().to_string(),
                        path: path.to_string(),
                    }
                );
                ensure!(
                    path.shared_prefix_depth(parent.path()) == depth - 1,
                    ParentNotPrefixSnafu {
                        parent: parent.path().to_string(),
                        path: path.to_string(),
                    }
                );
            }
        }

        let children = node
            .children()
            .map(|(key, child_id)| {
                nodes
                    .get(child_id)
                    .map(|child| (key, child))
                    .context(DanglingSnafu {
                        id: child_id,
                        referrer: path.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // siblings are compared by their own paths, not by the keys they are filed under
        for pair in children.windows(2) {
            let [(_, first), (_, second)] = pair else {
                continue;
            };
            match first.compare(second) {
                Ordering::Less => {}
                Ordering::Equal => {
                    return DuplicateChildSnafu {
                        parent: path.to_string(),
                        path: second.path().to_string(),
                    }
                    .fail();
                }
                Ordering::Greater => {
                    return UnorderedChildrenSnafu {
                        first: first.path().to_string(),
                        second: second.path().to_string(),
                    }
                    .fail();
                }
            }
        }

        for (key, child) in children {
            ensure!(
                child.path() == key,
                MisfiledChildSnafu {
                    key: key.to_string(),
                    path: child.path().to_string(),
                }
            );
            ensure!(
                child.parent() == Some(id),
                WrongBackReferenceSnafu {
                    parent: path.to_string(),
                    path: child.path().to_string(),
                }
            );
            ensure!(
                child.path().depth() == depth + 1,
                ChildDepthSnafu {
                    parent: path.to_string(),
                    path: child.path().to_string(),
                }
            );
        }

        Ok(())
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum CheckerError {
    #[snafu(display("Not initialized, but count is {}", count))]
    UninitializedWithCount { count: usize },
    #[snafu(display("Not initialized, but root is set"))]
    UninitializedWithRoot,
    #[snafu(display("Count is {}, but root is not set", count))]
    CountWithoutRoot { count: usize },
    #[snafu(display("Root is set, but count is 0"))]
    RootWithoutCount,
    #[snafu(display("Node {} referenced by {} does not exist", id, referrer))]
    Dangling { id: NodeId, referrer: String },
    #[snafu(display("Root '{}' has a parent", path))]
    RootHasParent { path: String },
    #[snafu(display("'{}' is deeper than 1 but has no parent", path))]
    MissingParent { path: String },
    #[snafu(display("'{}' has depth 1 but has a parent", path))]
    UnexpectedParent { path: String },
    #[snafu(display("Parent '{}' of '{}' has no children", parent, path))]
    ChildlessParent { parent: String, path: String },
    #[snafu(display("Parent '{}' is not the longest proper prefix of '{}'", parent, path))]
    ParentNotPrefix { parent: String, path: String },
    #[snafu(display("Child filed under '{}' has path '{}'", key, path))]
    MisfiledChild { key: String, path: String },
    #[snafu(display("Child '{}' of '{}' points at another parent", path, parent))]
    WrongBackReference { parent: String, path: String },
    #[snafu(display("Child '{}' of '{}' is not exactly one level deeper", path, parent))]
    ChildDepth { parent: String, path: String },
    #[snafu(display("'{}' has duplicate children '{}'", parent, path))]
    DuplicateChild { parent: String, path: String },
    #[snafu(display("Children '{}' and '{}' are out of order", first, second))]
    UnorderedChildren { first: String, second: String },
    #[snafu(display("Count is {}, but {} node(s) are reachable from the root", count, reachable))]
    CountMismatch { count: usize, reachable: usize },
}
