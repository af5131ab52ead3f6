//! Slash-delimited paths addressing nodes of a file tree.

mod path;

pub use path::{DELIMITER, FtPath, PathError};
