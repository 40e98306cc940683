//! 数据模型层

pub mod file;
pub mod file_tree;
pub mod layout;

pub use file::{FileDescriptor, FilePatch};
pub use file_tree::{FileTree, FileTreeEntry, FileTreeError, FileTreeRow, LoadState, NodeId};
pub use layout::{AreaSnapshot, GroupId, GroupRef, GroupSnapshot, Layout, LayoutSnapshot};
