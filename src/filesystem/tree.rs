use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, info, warn};

use crate::filesystem::node::{NodeError, NodeId, NodeKind, NodeStore, NodeType};
use crate::path::{FtPath, PathError};

/// Settings applied to a [`FileTree`] when it is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeConfig {
    /// Upper bound on live nodes. Creating a node past it fails with a
    /// memory error, exactly as an allocation failure would.
    pub max_nodes: Option<usize>,
}

/// Result of [`FileTree::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStat {
    Directory,
    File { size: usize },
}

impl NodeStat {
    pub fn is_file(&self) -> bool {
        matches!(self, NodeStat::File { .. })
    }

    pub fn size(&self) -> Option<usize> {
        match self {
            NodeStat::File { size } => Some(*size),
            NodeStat::Directory => None,
        }
    }
}

/// An in-memory hierarchy of directories and files rooted at one directory.
///
/// The tree starts uninitialized; [`FileTree::init`] makes it usable and
/// [`FileTree::destroy`] frees every node and returns it to the
/// uninitialized state. Directories may be internal nodes or leaves, files
/// are always leaves.
#[derive(Debug)]
pub struct FileTree {
    initialized: bool,
    root: Option<NodeId>,
    count: usize,
    nodes: NodeStore,
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTree {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            initialized: false,
            root: None,
            count: 0,
            nodes: NodeStore::with_limit(config.max_nodes),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_tests(&mut self) -> (&mut NodeStore, &mut usize) {
        (&mut self.nodes, &mut self.count)
    }

    pub fn init(&mut self) -> Result<(), TreeError> {
        ensure!(!self.initialized, InitializationSnafu);
        self.initialized = true;
        self.root = None;
        self.count = 0;
        info!("File tree initialized");
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<(), TreeError> {
        ensure!(self.initialized, InitializationSnafu);
        if let Some(root) = self.root.take() {
            self.count -= self.nodes.destroy(root);
        }
        self.initialized = false;
        info!("File tree destroyed");
        Ok(())
    }

    /// Walks from the root along successive prefixes of `path` and returns
    /// the deepest node that exists, or `None` when there is no root.
    ///
    /// With `require_directories`, reaching a file anywhere before the last
    /// component fails with [`TreeError::NotADirectory`].
    fn traverse(
        &self,
        path: &FtPath,
        require_directories: bool,
    ) -> Result<Option<NodeId>, TreeError> {
        let Some(root) = self.root else {
            return Ok(None);
        };

        let top = path.prefix(1).map_err(|e| path_failure(e, path))?;
        if self.nodes.path(root) != Some(&top) {
            return ConflictingPathSnafu {
                path: path.to_string(),
            }
            .fail();
        }

        let mut current = root;
        for depth in 2..=path.depth() {
            let prefix = path.prefix(depth).map_err(|e| path_failure(e, path))?;
            let Some(child) = self.nodes.child_by_path(current, &prefix) else {
                break;
            };
            if require_directories
                && depth < path.depth()
                && self.nodes.node_type(child) == Some(NodeType::File)
            {
                return NotADirectorySnafu {
                    path: prefix.to_string(),
                }
                .fail();
            }
            current = child;
        }

        Ok(Some(current))
    }

    pub fn insert_directory(&mut self, path: &str) -> Result<(), TreeError> {
        self.insert(path, NodeKind::directory())
    }

    pub fn insert_file(
        &mut self,
        path: &str,
        contents: Vec<u8>,
        length: usize,
    ) -> Result<(), TreeError> {
        self.insert(path, NodeKind::file(contents, length))
    }

    /// Creates every missing node from the deepest existing ancestor down to
    /// `path`, with `leaf` as the final node. Either all of them are linked
    /// into the tree or none are.
    fn insert(&mut self, path: &str, leaf: NodeKind) -> Result<(), TreeError> {
        ensure!(self.initialized, InitializationSnafu);
        let path = FtPath::parse(path).context(BadPathSnafu)?;
        let furthest = self.traverse(&path, true)?;

        let first_depth = match furthest {
            None => {
                ensure!(
                    self.root.is_none() && leaf.node_type() == NodeType::Directory,
                    ConflictingPathSnafu {
                        path: path.to_string(),
                    }
                );
                1
            }
            Some(id) => {
                let existing = self.nodes.path(id).context(ConflictingPathSnafu {
                    path: path.to_string(),
                })?;
                ensure!(
                    *existing != path,
                    AlreadyInTreeSnafu {
                        path: path.to_string(),
                    }
                );
                existing.depth() + 1
            }
        };

        let (first_new, created) = self.build_chain(&path, furthest, first_depth, leaf)?;

        if self.root.is_none() {
            self.root = Some(first_new);
        }
        self.count += created;
        debug!("Inserted '{}' creating {} node(s)", path, created);
        Ok(())
    }

    fn build_chain(
        &mut self,
        path: &FtPath,
        ancestor: Option<NodeId>,
        first_depth: usize,
        leaf: NodeKind,
    ) -> Result<(NodeId, usize), TreeError> {
        let mut leaf = Some(leaf);
        let mut first_new = None;
        let mut parent = ancestor;
        let mut created = 0;

        for depth in first_depth..=path.depth() {
            let kind = if depth == path.depth() {
                leaf.take().unwrap_or_else(NodeKind::directory)
            } else {
                NodeKind::directory()
            };
            let step = path
                .prefix(depth)
                .map_err(|e| path_failure(e, path))
                .and_then(|prefix| {
                    self.nodes
                        .create(prefix, parent, kind)
                        .map_err(|e| node_failure(e, path))
                });

            match step {
                Ok(id) => {
                    first_new.get_or_insert(id);
                    parent = Some(id);
                    created += 1;
                }
                Err(error) => {
                    if let Some(first) = first_new {
                        let freed = self.nodes.destroy(first);
                        warn!(
                            "Insertion of '{}' failed after {} new node(s), unwound {}",
                            path, created, freed
                        );
                    }
                    return Err(error);
                }
            }
        }

        first_new
            .map(|first| (first, created))
            .context(AlreadyInTreeSnafu {
                path: path.to_string(),
            })
    }

    pub fn remove_directory(&mut self, path: &str) -> Result<(), TreeError> {
        self.remove(path, NodeType::Directory)
    }

    pub fn remove_file(&mut self, path: &str) -> Result<(), TreeError> {
        self.remove(path, NodeType::File)
    }

    fn remove(&mut self, path: &str, expected: NodeType) -> Result<(), TreeError> {
        let id = self.locate(path)?;
        let found = self.nodes.node_type(id);
        if found != Some(expected) {
            let path = path.to_string();
            return match expected {
                NodeType::Directory => NotADirectorySnafu { path }.fail(),
                NodeType::File => NotAFileSnafu { path }.fail(),
            };
        }

        let freed = self.nodes.destroy(id);
        self.count -= freed;
        if self.count == 0 {
            self.root = None;
        }
        debug!("Removed '{}' freeing {} node(s)", path, freed);
        Ok(())
    }

    /// Finds the node whose path is exactly `path`.
    fn locate(&self, path: &str) -> Result<NodeId, TreeError> {
        ensure!(self.initialized, InitializationSnafu);
        let path = FtPath::parse(path).context(BadPathSnafu)?;
        self.traverse(&path, false)?
            .filter(|id| self.nodes.path(*id) == Some(&path))
            .context(NoSuchPathSnafu {
                path: path.to_string(),
            })
    }

    fn locate_as(&self, path: &str, expected: NodeType) -> Option<NodeId> {
        self.locate(path)
            .ok()
            .filter(|id| self.nodes.node_type(*id) == Some(expected))
    }

    pub fn contains_directory(&self, path: &str) -> bool {
        self.locate_as(path, NodeType::Directory).is_some()
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.locate_as(path, NodeType::File).is_some()
    }

    pub fn get_file_contents(&self, path: &str) -> Option<&[u8]> {
        self.locate_as(path, NodeType::File)
            .and_then(|id| self.nodes.contents(id))
    }

    /// Swaps in new contents for the file at `path` and returns the old ones.
    pub fn replace_file_contents(
        &mut self,
        path: &str,
        contents: Vec<u8>,
        length: usize,
    ) -> Option<Vec<u8>> {
        let id = self.locate_as(path, NodeType::File)?;
        self.nodes.set_contents(id, contents, length).ok()
    }

    pub fn stat(&self, path: &str) -> Result<NodeStat, TreeError> {
        let id = self.locate(path)?;
        match self.nodes.length(id) {
            Some(size) => Ok(NodeStat::File { size }),
            None => Ok(NodeStat::Directory),
        }
    }

    /// Renders every path in the tree, one per line, in pre-order.
    ///
    /// At each directory the file children are listed before any
    /// subdirectory is descended into. `None` if the tree is not initialized.
    pub fn to_tree_string(&self) -> Option<String> {
        if !self.initialized {
            return None;
        }

        let mut out = String::new();
        let Some(root) = self.root else {
            return Some(out);
        };

        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            push_line(&mut out, node.path());

            let mut directories = Vec::new();
            for (child_path, child) in node.children() {
                match self.nodes.node_type(child) {
                    Some(NodeType::File) => push_line(&mut out, child_path),
                    Some(NodeType::Directory) => directories.push(child),
                    None => {}
                }
            }
            pending.extend(directories.into_iter().rev());
        }

        Some(out)
    }
}

fn push_line(out: &mut String, path: &FtPath) {
    out.reserve(path.str_len() + 1);
    out.push_str(&path.to_string());
    out.push('\n');
}

fn path_failure(source: PathError, path: &FtPath) -> TreeError {
    match source {
        PathError::Allocation { .. } => TreeError::Memory {
            path: path.to_string(),
        },
        source => TreeError::BadPath { source },
    }
}

fn node_failure(source: NodeError, path: &FtPath) -> TreeError {
    let path = path.to_string();
    match source {
        NodeError::Allocation { .. } => TreeError::Memory { path },
        NodeError::DuplicateChild { .. } => TreeError::AlreadyInTree { path },
        NodeError::ParentNotDirectory { .. } | NodeError::NotAFile { .. } => {
            TreeError::NotADirectory { path }
        }
        NodeError::UnknownNode { .. }
        | NodeError::NotAChildPath { .. }
        | NodeError::RootDepth { .. } => TreeError::ConflictingPath { path },
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum TreeError {
    #[snafu(display("Malformed path"))]
    BadPath { source: PathError },
    #[snafu(display("File tree is not in the required initialization state"))]
    Initialization,
    #[snafu(display("'{}' is not rooted under the tree's root", path))]
    ConflictingPath { path: String },
    #[snafu(display("'{}' is not a directory", path))]
    NotADirectory { path: String },
    #[snafu(display("'{}' is not a file", path))]
    NotAFile { path: String },
    #[snafu(display("'{}' is already in the tree", path))]
    AlreadyInTree { path: String },
    #[snafu(display("'{}' does not exist in the tree", path))]
    NoSuchPath { path: String },
    #[snafu(display("Failed to allocate memory while building '{}'", path))]
    Memory { path: String },
}

impl TreeError {
    pub const KINDS: [&'static str; 8] = [
        "bad-path",
        "initialization-error",
        "conflicting-path",
        "not-a-directory",
        "not-a-file",
        "already-in-tree",
        "no-such-path",
        "memory-error",
    ];

    /// Stable kebab-case name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            TreeError::BadPath { .. } => "bad-path",
            TreeError::Initialization => "initialization-error",
            TreeError::ConflictingPath { .. } => "conflicting-path",
            TreeError::NotADirectory { .. } => "not-a-directory",
            TreeError::NotAFile { .. } => "not-a-file",
            TreeError::AlreadyInTree { .. } => "already-in-tree",
            TreeError::NoSuchPath { .. } => "no-such-path",
            TreeError::Memory { .. } => "memory-error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::TreeChecker;
    use rstest::*;

    fn assert_valid(tree: &FileTree) {
        if let Err(e) = TreeChecker::check(tree) {
            panic!("tree invariants violated: {e}");
        }
    }

    #[fixture]
    fn tree() -> FileTree {
        let mut tree = FileTree::new();
        tree.init().expect("fresh tree initializes");
        assert_valid(&tree);
        tree
    }

    #[rstest]
    fn new_tree_is_uninitialized() {
        let tree = FileTree::new();
        assert!(!tree.is_initialized());
        assert_eq!(tree.to_tree_string(), None);
        assert!(!tree.contains_directory("a"));
        assert_valid(&tree);
    }

    #[rstest]
    fn operations_before_init_fail(mut tree: FileTree) {
        tree.destroy().unwrap();

        assert_eq!(tree.insert_directory("a"), Err(TreeError::Initialization));
        assert_eq!(
            tree.insert_file("a/b", Vec::new(), 0),
            Err(TreeError::Initialization)
        );
        assert_eq!(tree.remove_directory("a"), Err(TreeError::Initialization));
        assert_eq!(tree.remove_file("a/b"), Err(TreeError::Initialization));
        assert_eq!(tree.stat("a"), Err(TreeError::Initialization));
        assert_eq!(tree.destroy(), Err(TreeError::Initialization));
        assert_eq!(tree.get_file_contents("a/b"), None);
        assert_valid(&tree);
    }

    #[rstest]
    fn init_twice_fails(mut tree: FileTree) {
        assert_eq!(tree.init(), Err(TreeError::Initialization));
        assert!(tree.is_initialized());
    }

    #[rstest]
    fn empty_tree_renders_empty_string(tree: FileTree) {
        assert_eq!(tree.to_tree_string(), Some(String::new()));
        assert_eq!(tree.count(), 0);
        assert_eq!(tree.root(), None);
    }

    #[rstest]
    #[case("")]
    #[case("/1root/2child")]
    #[case("1root/2child/")]
    #[case("1root//2child")]
    fn malformed_paths_are_bad_paths(mut tree: FileTree, #[case] path: &str) {
        assert!(matches!(
            tree.insert_directory(path),
            Err(TreeError::BadPath { .. })
        ));
        assert!(matches!(
            tree.insert_file(path, Vec::new(), 0),
            Err(TreeError::BadPath { .. })
        ));
        assert!(matches!(
            tree.remove_directory(path),
            Err(TreeError::BadPath { .. })
        ));
        assert_eq!(tree.count(), 0);
        assert_valid(&tree);
    }

    #[rstest]
    #[case("A")]
    #[case("A/b")]
    fn file_cannot_start_a_tree(mut tree: FileTree, #[case] path: &str) {
        assert!(matches!(
            tree.insert_file(path, Vec::new(), 0),
            Err(TreeError::ConflictingPath { .. })
        ));
        assert_eq!(tree.root(), None);
        assert_valid(&tree);
    }

    #[rstest]
    fn insert_directory_creates_every_prefix(mut tree: FileTree) {
        tree.insert_directory("1root/2child/3gkid").unwrap();
        assert_valid(&tree);

        assert_eq!(tree.count(), 3);
        assert!(tree.contains_directory("1root"));
        assert!(tree.contains_directory("1root/2child"));
        assert!(tree.contains_directory("1root/2child/3gkid"));
        assert!(!tree.contains_file("1root/2child"));
        assert_eq!(
            tree.to_tree_string().unwrap(),
            "1root\n1root/2child\n1root/2child/3gkid\n"
        );
    }

    #[rstest]
    fn duplicate_insertion_is_rejected(mut tree: FileTree) {
        tree.insert_directory("1root/2child/3gkid").unwrap();
        tree.insert_file("1root/2file", b"x".to_vec(), 1).unwrap();

        assert_eq!(
            tree.insert_directory("1root/2child/3gkid"),
            Err(TreeError::AlreadyInTree {
                path: "1root/2child/3gkid".into()
            })
        );
        assert!(matches!(
            tree.insert_file("1root/2child/3gkid", Vec::new(), 0),
            Err(TreeError::AlreadyInTree { .. })
        ));
        assert!(matches!(
            tree.insert_file("1root/2file", Vec::new(), 0),
            Err(TreeError::AlreadyInTree { .. })
        ));
        assert!(matches!(
            tree.insert_directory("1root"),
            Err(TreeError::AlreadyInTree { .. })
        ));
        assert_eq!(tree.count(), 4);
        assert_valid(&tree);
    }

    #[rstest]
    #[case("1otherroot")]
    #[case("1otherroot/2d")]
    #[case("2child")]
    fn paths_outside_root_conflict(mut tree: FileTree, #[case] path: &str) {
        tree.insert_directory("1root/2child").unwrap();

        assert!(matches!(
            tree.insert_directory(path),
            Err(TreeError::ConflictingPath { .. })
        ));
        assert!(matches!(
            tree.insert_file(path, Vec::new(), 0),
            Err(TreeError::ConflictingPath { .. })
        ));
        assert!(matches!(
            tree.stat(path),
            Err(TreeError::ConflictingPath { .. })
        ));
        assert!(!tree.contains_directory(path));
        assert_eq!(tree.count(), 2);
        assert_valid(&tree);
    }

    #[rstest]
    fn nothing_can_be_inserted_below_a_file(mut tree: FileTree) {
        tree.insert_directory("1root").unwrap();
        tree.insert_file("1root/2third", b"data".to_vec(), 4).unwrap();

        assert_eq!(
            tree.insert_directory("1root/2third/3nopeD"),
            Err(TreeError::NotADirectory {
                path: "1root/2third".into()
            })
        );
        assert!(matches!(
            tree.insert_file("1root/2third/3nopeF/4deeper", Vec::new(), 0),
            Err(TreeError::NotADirectory { .. })
        ));
        assert_eq!(tree.count(), 2);
        assert_eq!(tree.nodes().child_count(tree.root().unwrap()), 1);
        assert_valid(&tree);
    }

    #[rstest]
    fn siblings_with_repeated_names_are_allowed(mut tree: FileTree) {
        tree.insert_directory("1root/2child/3gk2/4ggk").unwrap();
        tree.insert_directory("1root/2child/2child/2child").unwrap();
        tree.insert_file("1root/2child/2child/2child/2child", Vec::new(), 0)
            .unwrap();

        assert!(tree.contains_file("1root/2child/2child/2child/2child"));
        assert!(tree.contains_directory("1root/2child/2child/2child"));
        assert_eq!(tree.count(), 7);
        assert_valid(&tree);
    }

    #[rstest]
    fn files_are_listed_before_subdirectories(mut tree: FileTree) {
        tree.insert_directory("1root/2child/3gkid").unwrap();
        tree.insert_file("1root/2second/3gfile", Vec::new(), 0).unwrap();
        tree.insert_file("1root/2third", Vec::new(), 0).unwrap();
        tree.insert_file("1root/1afile", Vec::new(), 0).unwrap();
        tree.insert_file("1root/2child/9late", Vec::new(), 0).unwrap();
        assert_valid(&tree);

        let expected = "\
1root
1root/1afile
1root/2third
1root/2child
1root/2child/9late
1root/2child/3gkid
1root/2second
1root/2second/3gfile
";
        assert_eq!(tree.to_tree_string().unwrap(), expected);
    }

    #[rstest]
    fn file_contents_can_be_read_and_replaced(mut tree: FileTree) {
        tree.insert_directory("root").unwrap();
        tree.insert_file("root/notes", b"first".to_vec(), 5).unwrap();

        assert_eq!(tree.get_file_contents("root/notes"), Some(&b"first"[..]));
        assert_eq!(tree.stat("root/notes"), Ok(NodeStat::File { size: 5 }));

        let previous = tree.replace_file_contents("root/notes", b"second!".to_vec(), 7);

        assert_eq!(previous, Some(b"first".to_vec()));
        assert_eq!(tree.get_file_contents("root/notes"), Some(&b"second!"[..]));
        assert_eq!(tree.stat("root/notes").unwrap().size(), Some(7));
        assert_valid(&tree);
    }

    #[rstest]
    #[case("root")]
    #[case("root/missing")]
    #[case("elsewhere/notes")]
    #[case("root//notes")]
    fn content_access_is_best_effort(mut tree: FileTree, #[case] path: &str) {
        tree.insert_directory("root").unwrap();
        tree.insert_file("root/notes", b"keep".to_vec(), 4).unwrap();

        assert_eq!(tree.get_file_contents(path), None);
        assert_eq!(tree.replace_file_contents(path, b"lost".to_vec(), 4), None);
        assert_eq!(tree.get_file_contents("root/notes"), Some(&b"keep"[..]));
    }

    #[rstest]
    fn stat_reports_kind_and_missing_paths(mut tree: FileTree) {
        tree.insert_directory("root/dir").unwrap();
        tree.insert_file("root/file", Vec::new(), 12).unwrap();

        let dir = tree.stat("root/dir").unwrap();
        assert!(!dir.is_file());
        assert_eq!(dir.size(), None);
        assert_eq!(tree.stat("root/file"), Ok(NodeStat::File { size: 12 }));
        assert_eq!(
            tree.stat("root/none"),
            Err(TreeError::NoSuchPath {
                path: "root/none".into()
            })
        );
        assert!(matches!(
            tree.stat("root/file/below"),
            Err(TreeError::NoSuchPath { .. })
        ));
    }

    #[rstest]
    fn removal_checks_kind_and_existence(mut tree: FileTree) {
        tree.insert_directory("root/dir").unwrap();
        tree.insert_file("root/file", Vec::new(), 0).unwrap();

        assert!(matches!(
            tree.remove_directory("root/file"),
            Err(TreeError::NotADirectory { .. })
        ));
        assert!(matches!(
            tree.remove_file("root/dir"),
            Err(TreeError::NotAFile { .. })
        ));
        assert!(matches!(
            tree.remove_file("root/ghost"),
            Err(TreeError::NoSuchPath { .. })
        ));
        assert!(matches!(
            tree.remove_directory("other"),
            Err(TreeError::ConflictingPath { .. })
        ));
        assert_eq!(tree.count(), 3);
        assert_valid(&tree);
    }

    #[rstest]
    fn removal_subtracts_whole_subtree(mut tree: FileTree) {
        tree.insert_directory("root/a/b/c").unwrap();
        tree.insert_file("root/a/b/f", Vec::new(), 0).unwrap();
        tree.insert_directory("root/z").unwrap();
        assert_eq!(tree.count(), 6);

        tree.remove_directory("root/a").unwrap();
        assert_valid(&tree);

        assert_eq!(tree.count(), 2);
        assert!(!tree.contains_directory("root/a/b"));
        assert!(!tree.contains_file("root/a/b/f"));
        assert!(tree.contains_directory("root/z"));
    }

    #[rstest]
    fn removing_last_node_clears_root(mut tree: FileTree) {
        tree.insert_directory("root/only").unwrap();
        tree.remove_directory("root").unwrap();
        assert_valid(&tree);

        assert_eq!(tree.count(), 0);
        assert_eq!(tree.root(), None);
        assert_eq!(tree.to_tree_string(), Some(String::new()));

        // a different root is now acceptable
        tree.insert_directory("fresh").unwrap();
        assert!(tree.contains_directory("fresh"));
        assert_valid(&tree);
    }

    #[rstest]
    fn failed_insertion_leaves_tree_untouched() {
        let mut tree = FileTree::with_config(TreeConfig { max_nodes: Some(4) });
        tree.init().unwrap();
        tree.insert_directory("root/a").unwrap();
        let before = tree.to_tree_string();

        let result = tree.insert_file("root/b/c/d", b"payload".to_vec(), 7);

        assert_eq!(
            result,
            Err(TreeError::Memory {
                path: "root/b/c/d".into()
            })
        );
        assert_eq!(tree.count(), 2);
        assert_eq!(tree.nodes().live_count(), 2);
        assert_eq!(tree.to_tree_string(), before);
        assert!(!tree.contains_directory("root/b"));
        assert_valid(&tree);

        tree.insert_file("root/b/c", Vec::new(), 0).unwrap();
        assert_eq!(tree.count(), 4);
        assert_valid(&tree);
    }

    #[rstest]
    fn failed_first_insertion_keeps_tree_empty() {
        let mut tree = FileTree::with_config(TreeConfig { max_nodes: Some(1) });
        tree.init().unwrap();

        assert!(matches!(
            tree.insert_directory("root/a"),
            Err(TreeError::Memory { .. })
        ));
        assert_eq!(tree.root(), None);
        assert_eq!(tree.count(), 0);
        assert_valid(&tree);
    }

    #[rstest]
    fn destroy_resets_and_allows_reinit(mut tree: FileTree) {
        tree.insert_directory("root/a/b").unwrap();
        tree.insert_file("root/a/f", Vec::new(), 0).unwrap();

        tree.destroy().unwrap();
        assert_valid(&tree);
        assert!(!tree.is_initialized());
        assert_eq!(tree.count(), 0);
        assert_eq!(tree.root(), None);
        assert_eq!(tree.nodes().live_count(), 0);

        tree.init().unwrap();
        assert!(!tree.contains_directory("root"));
        tree.insert_directory("other").unwrap();
        assert_valid(&tree);
    }

    #[rstest]
    fn independent_trees_do_not_share_state(mut tree: FileTree) {
        let mut second = FileTree::new();
        second.init().unwrap();

        tree.insert_directory("left").unwrap();
        second.insert_directory("right").unwrap();

        assert!(tree.contains_directory("left"));
        assert!(!tree.contains_directory("right"));
        assert!(second.contains_directory("right"));
    }

    #[rstest]
    fn invariants_hold_through_mixed_operations(mut tree: FileTree) {
        type Step = fn(&mut FileTree) -> Result<(), TreeError>;
        let steps: [Step; 11] = [
            |t: &mut FileTree| t.insert_directory("r/a/b"),
            |t: &mut FileTree| t.insert_file("r/a/f1", b"1".to_vec(), 1),
            |t: &mut FileTree| t.insert_file("r/a/b/f2", b"22".to_vec(), 2),
            |t: &mut FileTree| t.insert_directory("r/c"),
            |t: &mut FileTree| t.insert_directory("r/a/f1/x"),
            |t: &mut FileTree| t.remove_file("r/a/b/f2"),
            |t: &mut FileTree| t.insert_directory("r/a/b/f2/deep/er"),
            |t: &mut FileTree| t.remove_directory("r/a"),
            |t: &mut FileTree| t.insert_file("r/c/z", Vec::new(), 0),
            |t: &mut FileTree| t.remove_directory("r"),
            |t: &mut FileTree| t.insert_directory("s"),
        ];

        for step in steps {
            let _ = step(&mut tree);
            assert_valid(&tree);
        }
        assert_eq!(tree.to_tree_string().unwrap(), "s\n");
    }

    #[test]
    fn error_kinds_are_stable() {
        let bad = TreeError::BadPath {
            source: PathError::Empty,
        };
        assert_eq!(bad.kind(), "bad-path");
        assert_eq!(TreeError::Initialization.kind(), "initialization-error");
        assert_eq!(
            TreeError::Memory { path: "a".into() }.to_string(),
            "Failed to allocate memory while building 'a'"
        );
    }
}
