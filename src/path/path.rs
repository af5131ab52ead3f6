use std::cmp::Ordering;
use std::fmt;

use snafu::{OptionExt, Snafu, ensure};

pub const DELIMITER: char = '/';

/// An absolute position in a file tree, stored as its ordered components.
///
/// Paths are validated on construction: they are never empty, never start or
/// end with the delimiter, and never contain two delimiters in a row. Two paths
/// are ordered component by component, so `a/b` sorts before `a/b/c` and
/// before `a/c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FtPath {
    components: Vec<String>,
}

impl FtPath {
    pub fn parse(path: impl AsRef<str>) -> Result<Self, PathError> {
        let path = path.as_ref();
        ensure!(!path.is_empty(), EmptySnafu);
        ensure!(
            !path.starts_with(DELIMITER),
            LeadingDelimiterSnafu { path }
        );
        ensure!(!path.ends_with(DELIMITER), TrailingDelimiterSnafu { path });

        let components = path
            .split(DELIMITER)
            .map(|component| {
                if component.is_empty() {
                    EmptyComponentSnafu { path }.fail()
                } else {
                    Ok(component.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }

    /// Number of components. Always at least one.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// Builds the path made of the first `depth` components.
    pub fn prefix(&self, depth: usize) -> Result<Self, PathError> {
        ensure!(
            depth >= 1 && depth <= self.depth(),
            DepthOutOfRangeSnafu {
                path: self.to_string(),
                depth,
            }
        );

        let mut components = Vec::new();
        components
            .try_reserve_exact(depth)
            .ok()
            .context(AllocationSnafu { depth })?;
        components.extend(self.components[..depth].iter().cloned());

        Ok(Self { components })
    }

    /// Length of the longest common leading run of components.
    pub fn shared_prefix_depth(&self, other: &FtPath) -> usize {
        self.components
            .iter()
            .zip(other.components.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &FtPath) -> bool {
        self.depth() <= other.depth() && self.shared_prefix_depth(other) == self.depth()
    }

    /// Length of the slash-joined string form.
    pub fn str_len(&self) -> usize {
        self.components.iter().map(String::len).sum::<usize>() + self.depth() - 1
    }
}

impl PartialOrd for FtPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FtPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl fmt::Display for FtPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut components = self.components();
        if let Some(first) = components.next() {
            f.write_str(first)?;
        }
        for component in components {
            write!(f, "{DELIMITER}{component}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum PathError {
    #[snafu(display("Path must not be empty"))]
    Empty,
    #[snafu(display("Path '{}' starts with a delimiter", path))]
    LeadingDelimiter { path: String },
    #[snafu(display("Path '{}' ends with a delimiter", path))]
    TrailingDelimiter { path: String },
    #[snafu(display("Path '{}' contains consecutive delimiters", path))]
    EmptyComponent { path: String },
    #[snafu(display("Path '{}' has no prefix of depth {}", path, depth))]
    DepthOutOfRange { path: String, depth: usize },
    #[snafu(display("Failed to allocate a path of depth {}", depth))]
    Allocation { depth: usize },
}
