//! 文件树数据模型
//!
//! 节点来自后端资源列表，目录按需加载：`set_children` 用一次列目录的结果替换某个节点的子节点。

use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{new_key_type, SlotMap};
use std::fmt;

use crate::paths;

new_key_type! { pub struct NodeId; }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTreeError {
    NotFound(String),
    NotADirectory(String),
    InvalidNodeId,
}

impl fmt::Display for FileTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileTreeError::NotFound(p) => write!(f, "node not found: {}", p),
            FileTreeError::NotADirectory(p) => write!(f, "not a directory: {}", p),
            FileTreeError::InvalidNodeId => write!(f, "invalid node id"),
        }
    }
}

impl std::error::Error for FileTreeError {}

/// 一条文件树记录（列目录结果中的一项）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTreeEntry {
    pub parent: Option<String>,
    pub name: CompactString,
    pub path: String,
    pub is_folder: bool,
    pub icon: &'static str,
    pub is_leaf: bool,
}

impl FileTreeEntry {
    pub fn new(
        parent: Option<&str>,
        name: &str,
        path: &str,
        is_folder: bool,
        has_children: bool,
    ) -> Self {
        Self {
            parent: parent.map(str::to_string),
            name: CompactString::from(name),
            path: path.to_string(),
            is_folder,
            icon: icon_for(name, is_folder),
            is_leaf: !is_folder || !has_children,
        }
    }
}

pub const FOLDER_ICON: &str = "folder-default";
pub const FILE_ICON: &str = "file-default";

/// 文件图标：目录固定，文件按后缀选择，未知后缀用默认图标
pub fn icon_for(name: &str, is_folder: bool) -> &'static str {
    if is_folder {
        return FOLDER_ICON;
    }
    match paths::suffix(name) {
        Some("yak") => "file-yak",
        Some("json") => "file-json",
        Some("md") => "file-markdown",
        Some("txt") | Some("log") => "file-text",
        Some("yaml") | Some("yml") => "file-yaml",
        Some("go") => "file-go",
        Some("py") => "file-python",
        Some("js") => "file-javascript",
        Some("ts") => "file-typescript",
        Some("html") => "file-html",
        Some("css") => "file-css",
        Some("sh") => "file-shell",
        _ => FILE_ICON,
    }
}

/// 目录排在前面，其余保持原顺序
pub fn sort_dirs_first(entries: &mut [FileTreeEntry]) {
    entries.sort_by_key(|entry| !entry.is_folder);
}

#[derive(Debug, Clone)]
struct Node {
    entry: FileTreeEntry,
    parent: Option<NodeId>,
    children: Option<Vec<NodeId>>,
    load_state: LoadState,
}

#[derive(Debug, Clone, Default)]
pub struct FileTree {
    arena: SlotMap<NodeId, Node>,
    roots: Vec<NodeId>,
    expanded: FxHashSet<NodeId>,
    selected: Option<NodeId>,
    id_by_path: FxHashMap<String, NodeId>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn set_selected(&mut self, id: Option<NodeId>) {
        self.selected = id;
    }

    pub fn entry(&self, id: NodeId) -> Option<&FileTreeEntry> {
        self.arena.get(id).map(|n| &n.entry)
    }

    pub fn load_state(&self, id: NodeId) -> Option<LoadState> {
        self.arena.get(id).map(|n| n.load_state)
    }

    pub fn set_load_state(&mut self, id: NodeId, state: LoadState) {
        if let Some(node) = self.arena.get_mut(id) {
            node.load_state = state;
        }
    }

    fn insert_node(&mut self, entry: FileTreeEntry, parent: Option<NodeId>) -> NodeId {
        // 同一路径重复出现时替换旧节点
        if let Some(old) = self.id_by_path.get(&entry.path).copied() {
            self.detach(old);
            self.recursive_remove(old);
        }

        let load_state = if entry.is_folder && !entry.is_leaf {
            LoadState::NotLoaded
        } else {
            LoadState::Loaded
        };
        let path = entry.path.clone();
        let id = self.arena.insert(Node {
            entry,
            parent,
            children: None,
            load_state,
        });
        self.id_by_path.insert(path, id);
        id
    }

    /// 用顶层列目录结果重建整棵树
    pub fn set_roots(&mut self, entries: Vec<FileTreeEntry>) {
        *self = Self::new();
        for entry in entries {
            let id = self.insert_node(entry, None);
            self.roots.push(id);
        }
    }

    /// 用顶层列目录结果刷新根节点，仍然存在的目录保留展开状态与已加载的子树
    pub fn refresh_roots(&mut self, entries: Vec<FileTreeEntry>) {
        let old = std::mem::take(&mut self.roots);
        self.roots = self.merge_siblings(None, old, entries);
    }

    /// 用新的列目录结果替换一组兄弟节点：路径与类型都没变的复用原节点，
    /// 消失的连同子树删除，新出现的插入
    fn merge_siblings(
        &mut self,
        parent: Option<NodeId>,
        old: Vec<NodeId>,
        entries: Vec<FileTreeEntry>,
    ) -> Vec<NodeId> {
        let old_set: FxHashSet<NodeId> = old.iter().copied().collect();
        let mut kept = FxHashSet::default();
        let mut merged = Vec::with_capacity(entries.len());

        for entry in entries {
            let reusable = self.find_node_by_path(&entry.path).filter(|id| {
                old_set.contains(id) && !kept.contains(id) && self.is_dir(*id) == entry.is_folder
            });
            match reusable {
                Some(id) => {
                    self.refresh_entry(id, entry);
                    kept.insert(id);
                    merged.push(id);
                }
                None => merged.push(self.insert_node(entry, parent)),
            }
        }

        for id in old {
            if !kept.contains(&id) {
                self.recursive_remove(id);
            }
        }
        merged
    }

    fn refresh_entry(&mut self, id: NodeId, mut entry: FileTreeEntry) {
        let Some(node) = self.arena.get_mut(id) else {
            return;
        };
        // 目录变空时丢弃已加载的子树
        let stale = if entry.is_leaf { node.children.take() } else { None };
        if node.children.is_some() {
            entry.is_leaf = false;
        } else {
            node.load_state = if entry.is_folder && !entry.is_leaf {
                LoadState::NotLoaded
            } else {
                LoadState::Loaded
            };
        }
        node.entry = entry;

        for child in stale.unwrap_or_default() {
            self.recursive_remove(child);
        }
    }

    /// 用列目录结果替换 `path` 节点的子节点；结果为空时该节点变为没有子节点的已加载目录。
    /// 仍然存在的子目录保留展开状态与已加载的子树
    pub fn set_children(
        &mut self,
        path: &str,
        entries: Vec<FileTreeEntry>,
    ) -> Result<(), FileTreeError> {
        let id = self
            .find_node_by_path(path)
            .ok_or_else(|| FileTreeError::NotFound(path.to_string()))?;
        if !self.is_dir(id) {
            return Err(FileTreeError::NotADirectory(path.to_string()));
        }

        let old_children = self
            .arena
            .get_mut(id)
            .and_then(|n| n.children.take())
            .unwrap_or_default();
        let children = self.merge_siblings(Some(id), old_children, entries);

        let node = self.arena.get_mut(id).ok_or(FileTreeError::InvalidNodeId)?;
        node.load_state = LoadState::Loaded;
        node.entry.is_leaf = children.is_empty();
        node.children = (!children.is_empty()).then_some(children);
        Ok(())
    }

    pub fn find_node_by_path(&self, path: &str) -> Option<NodeId> {
        self.id_by_path.get(path).copied()
    }

    pub fn is_dir(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some_and(|n| n.entry.is_folder)
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn toggle_expand(&mut self, id: NodeId) {
        if self.is_dir(id) {
            if self.expanded.contains(&id) {
                self.expanded.remove(&id);
            } else {
                self.expanded.insert(id);
            }
        }
    }

    pub fn expand(&mut self, id: NodeId) {
        if self.is_dir(id) {
            self.expanded.insert(id);
        }
    }

    pub fn collapse(&mut self, id: NodeId) {
        self.expanded.remove(&id);
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.arena
            .get(id)
            .and_then(|n| n.children.as_ref())
            .into_iter()
            .flatten()
            .copied()
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.arena.get(id).and_then(|n| n.parent);
        match parent {
            Some(parent_id) => {
                if let Some(children) = self
                    .arena
                    .get_mut(parent_id)
                    .and_then(|n| n.children.as_mut())
                {
                    children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|c| *c != id),
        }
    }

    fn recursive_remove(&mut self, id: NodeId) {
        let Some(node) = self.arena.remove(id) else {
            return;
        };
        for child in node.children.unwrap_or_default() {
            self.recursive_remove(child);
        }
        self.expanded.remove(&id);
        if self.id_by_path.get(&node.entry.path) == Some(&id) {
            self.id_by_path.remove(&node.entry.path);
        }
        if self.selected == Some(id) {
            self.selected = node.parent;
        }
    }

    /// 删除节点及其子树
    pub fn remove_path(&mut self, path: &str) -> Result<(), FileTreeError> {
        let id = self
            .find_node_by_path(path)
            .ok_or_else(|| FileTreeError::NotFound(path.to_string()))?;
        self.detach(id);
        self.recursive_remove(id);
        Ok(())
    }

    /// 节点自身及所有已加载后代的路径，用于重命名/删除目录时同步打开的文件
    pub fn descendant_paths(&self, path: &str) -> Vec<String> {
        let Some(id) = self.find_node_by_path(path) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(node_id) = stack.pop() {
            let Some(node) = self.arena.get(node_id) else {
                continue;
            };
            result.push(node.entry.path.clone());
            if let Some(children) = &node.children {
                stack.extend(children.iter().rev().copied());
            }
        }
        result
    }

    /// 重命名节点：改写子树中所有节点的 `path` 与 `parent`
    pub fn rename_path(&mut self, from: &str, to: &str) -> Result<(), FileTreeError> {
        let id = self
            .find_node_by_path(from)
            .ok_or_else(|| FileTreeError::NotFound(from.to_string()))?;

        let mut stack = vec![id];
        while let Some(node_id) = stack.pop() {
            let Some(node) = self.arena.get_mut(node_id) else {
                continue;
            };
            let entry = &mut node.entry;
            if let Some(new_path) = paths::replace_prefix(&entry.path, from, to) {
                self.id_by_path.remove(&entry.path);
                self.id_by_path.insert(new_path.clone(), node_id);
                entry.path = new_path;
            }
            entry.parent = entry.parent.take().map(|parent| {
                paths::replace_prefix(&parent, from, to).unwrap_or(parent)
            });
            if let Some(children) = &node.children {
                stack.extend(children.iter().copied());
            }
        }

        if let Some(node) = self.arena.get_mut(id) {
            node.entry.name = CompactString::from(paths::file_name(to));
            node.entry.icon = icon_for(paths::file_name(to), node.entry.is_folder);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileTreeRow {
    pub id: NodeId,
    pub depth: u16,
    pub name: CompactString,
    pub icon: &'static str,
    pub is_dir: bool,
    pub is_expanded: bool,
    pub load_state: LoadState,
}

impl FileTree {
    pub fn flatten_for_view(&self) -> Vec<FileTreeRow> {
        let mut result = Vec::new();
        let mut stack: Vec<(NodeId, u16)> = self.roots.iter().rev().map(|id| (*id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.arena.get(id) else {
                continue;
            };
            let is_expanded = self.expanded.contains(&id);
            result.push(FileTreeRow {
                id,
                depth,
                name: node.entry.name.clone(),
                icon: node.entry.icon,
                is_dir: node.entry.is_folder,
                is_expanded,
                load_state: node.load_state,
            });

            if is_expanded {
                if let Some(children) = &node.children {
                    for child in children.iter().rev() {
                        stack.push((*child, depth + 1));
                    }
                }
            }
        }

        result
    }
}

#[cfg(test)]
#[path = "../../tests/unit/models/file_tree.rs"]
mod tests;
