use std::cmp::Ordering;
use std::collections::BTreeMap;

use derive_more::Display;
use snafu::{OptionExt, Snafu, ensure};
use tracing::debug;

use crate::path::FtPath;

/// Handle to a node slot inside a [`NodeStore`].
///
/// Handles are only meaningful for the store that issued them, and a handle
/// to a destroyed node may later be reused for a new one.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("#{_0}")]
pub struct NodeId(usize);

#[cfg(test)]
impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    #[display("directory")]
    Directory,
    #[display("file")]
    File,
}

/// What a node holds: sorted children for a directory, bytes for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Directory {
        children: BTreeMap<FtPath, NodeId>,
    },
    File {
        contents: Vec<u8>,
        length: usize,
    },
}

impl NodeKind {
    pub fn directory() -> Self {
        NodeKind::Directory {
            children: BTreeMap::new(),
        }
    }

    pub fn file(contents: Vec<u8>, length: usize) -> Self {
        NodeKind::File { contents, length }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Directory { .. } => NodeType::Directory,
            NodeKind::File { .. } => NodeType::File,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    path: FtPath,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    pub fn path(&self) -> &FtPath {
        &self.path
    }

    /// Non-owning link back to the containing directory. `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn is_directory(&self) -> bool {
        self.node_type() == NodeType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.node_type() == NodeType::File
    }

    /// Children in path order. Files always yield nothing.
    pub fn children(&self) -> impl Iterator<Item = (&FtPath, NodeId)> {
        let children = match &self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        };
        children
            .into_iter()
            .flat_map(|children| children.iter().map(|(path, id)| (path, *id)))
    }

    pub fn child_count(&self) -> usize {
        match &self.kind {
            NodeKind::Directory { children } => children.len(),
            NodeKind::File { .. } => 0,
        }
    }

    pub fn contents(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::File { contents, .. } => Some(contents),
            NodeKind::Directory { .. } => None,
        }
    }

    pub fn length(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::File { length, .. } => Some(*length),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Total order used to keep siblings sorted and reject duplicates.
    pub fn compare(&self, other: &Node) -> Ordering {
        self.path.cmp(&other.path)
    }
}

/// Slot arena owning every node of one tree.
///
/// A directory owns its children through its child map; children point back
/// at their parent by [`NodeId`] only. Freed slots are recycled.
#[derive(Debug, Default)]
pub struct NodeStore {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
    live: usize,
    capacity_limit: Option<usize>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses to hold more than `limit` live nodes.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            capacity_limit: limit,
            ..Self::default()
        }
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of slots ever allocated, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Creates a node and registers it with `parent`.
    ///
    /// Every check and the slot reservation happen before the parent is
    /// touched, so a failure leaves the store exactly as it was.
    pub fn create(
        &mut self,
        path: FtPath,
        parent: Option<NodeId>,
        kind: NodeKind,
    ) -> Result<NodeId, NodeError> {
        match parent {
            Some(parent_id) => {
                let parent_node = self.get(parent_id).context(UnknownNodeSnafu { id: parent_id })?;
                ensure!(
                    parent_node.is_directory(),
                    ParentNotDirectorySnafu {
                        parent: parent_node.path.to_string(),
                    }
                );
                ensure!(
                    path.depth() == parent_node.path.depth() + 1
                        && parent_node.path.is_prefix_of(&path),
                    NotAChildPathSnafu {
                        parent: parent_node.path.to_string(),
                        path: path.to_string(),
                    }
                );
                ensure!(
                    self.has_child(parent_id, &path).is_none(),
                    DuplicateChildSnafu {
                        path: path.to_string(),
                    }
                );
            }
            None => {
                ensure!(
                    path.depth() == 1,
                    RootDepthSnafu {
                        path: path.to_string(),
                    }
                );
            }
        }

        let id = self.allocate_slot(&path)?;
        debug!("Created {} node {} at '{}'", kind.node_type(), id, path);

        if let Some(parent_id) = parent {
            if let Some(NodeKind::Directory { children }) = self.kind_mut(parent_id) {
                children.insert(path.clone(), id);
            }
        }
        self.slots[id.0] = Some(Node { path, parent, kind });
        self.live += 1;

        Ok(id)
    }

    fn allocate_slot(&mut self, path: &FtPath) -> Result<NodeId, NodeError> {
        if let Some(limit) = self.capacity_limit {
            ensure!(
                self.live < limit,
                AllocationSnafu {
                    path: path.to_string(),
                }
            );
        }

        if let Some(id) = self.free.pop() {
            return Ok(id);
        }

        self.slots
            .try_reserve(1)
            .ok()
            .context(AllocationSnafu {
                path: path.to_string(),
            })?;
        self.slots.push(None);
        Ok(NodeId(self.slots.len() - 1))
    }

    /// Destroys `id` and its whole subtree, detaching it from its parent.
    ///
    /// Returns the number of nodes freed, or 0 if `id` was not live.
    pub fn destroy(&mut self, id: NodeId) -> usize {
        let Some(node) = self.get(id) else {
            return 0;
        };

        if let Some(parent_id) = node.parent {
            let path = node.path.clone();
            if let Some(NodeKind::Directory { children }) = self.kind_mut(parent_id) {
                children.remove(&path);
            }
        }

        let mut freed = 0;
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(node) = self.slots.get_mut(current.0).and_then(Option::take) else {
                continue;
            };
            if let NodeKind::Directory { children } = node.kind {
                pending.extend(children.into_values());
            }
            self.free.push(current);
            freed += 1;
        }

        self.live -= freed;
        debug!("Destroyed {} node(s) starting at {}", freed, id);
        freed
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Rewires a node's back-reference without touching any child map.
    #[cfg(test)]
    pub(crate) fn set_parent_unchecked(&mut self, id: NodeId, parent: Option<NodeId>) {
        if let Some(node) = self.slots.get_mut(id.0).and_then(Option::as_mut) {
            node.parent = parent;
        }
    }

    /// Overwrites a node's own path, leaving the key it is filed under alone.
    #[cfg(test)]
    pub(crate) fn set_path_unchecked(&mut self, id: NodeId, path: FtPath) {
        if let Some(node) = self.slots.get_mut(id.0).and_then(Option::as_mut) {
            node.path = path;
        }
    }

    /// Moves whatever child `parent` files under `from` to the key `to`.
    #[cfg(test)]
    pub(crate) fn refile_child_unchecked(&mut self, parent: NodeId, from: &FtPath, to: FtPath) {
        if let Some(NodeKind::Directory { children }) = self.kind_mut(parent) {
            if let Some(child) = children.remove(from) {
                children.insert(to, child);
            }
        }
    }

    fn kind_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .map(|node| &mut node.kind)
    }

    pub fn path(&self, id: NodeId) -> Option<&FtPath> {
        self.get(id).map(Node::path)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.get(id).map(Node::node_type)
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.get(id).map(Node::child_count).unwrap_or(0)
    }

    /// Index of the child of `id` whose path is exactly `path`, if any.
    pub fn has_child(&self, id: NodeId, path: &FtPath) -> Option<usize> {
        match self.get(id)?.kind() {
            NodeKind::Directory { children } if children.contains_key(path) => {
                Some(children.range::<FtPath, _>(..path).count())
            }
            _ => None,
        }
    }

    pub fn child_by_path(&self, id: NodeId, path: &FtPath) -> Option<NodeId> {
        match self.get(id)?.kind() {
            NodeKind::Directory { children } => children.get(path).copied(),
            NodeKind::File { .. } => None,
        }
    }

    /// Ordinal access into the sorted children of `id`.
    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.get(id)?
            .children()
            .nth(index)
            .map(|(_, child)| child)
    }

    pub fn contents(&self, id: NodeId) -> Option<&[u8]> {
        self.get(id).and_then(Node::contents)
    }

    pub fn length(&self, id: NodeId) -> Option<usize> {
        self.get(id).and_then(Node::length)
    }

    /// Replaces the contents of a file node, handing back the old bytes.
    pub fn set_contents(
        &mut self,
        id: NodeId,
        contents: Vec<u8>,
        length: usize,
    ) -> Result<Vec<u8>, NodeError> {
        let node = self
            .slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .context(UnknownNodeSnafu { id })?;
        match &mut node.kind {
            NodeKind::File {
                contents: current,
                length: current_length,
            } => {
                *current_length = length;
                Ok(std::mem::replace(current, contents))
            }
            NodeKind::Directory { .. } => NotAFileSnafu {
                path: node.path.to_string(),
            }
            .fail(),
        }
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum NodeError {
    #[snafu(display("Failed to allocate a node for '{}'", path))]
    Allocation { path: String },
    #[snafu(display("Node {} does not exist", id))]
    UnknownNode { id: NodeId },
    #[snafu(display("Cannot add a child under '{}', which is a file", parent))]
    ParentNotDirectory { parent: String },
    #[snafu(display("'{}' is not a direct child path of '{}'", path, parent))]
    NotAChildPath { parent: String, path: String },
    #[snafu(display("'{}' is already a child of its parent", path))]
    DuplicateChild { path: String },
    #[snafu(display("Parentless node '{}' must have depth 1", path))]
    RootDepth { path: String },
    #[snafu(display("'{}' is a directory, not a file", path))]
    NotAFile { path: String },
}
