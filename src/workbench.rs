//! 工作台：聚合布局、文件树与服务
//!
//! 需要后端参与的操作先调用后端，成功后再修改布局与文件树；后端失败时布局保持不变，
//! 错误交给调用方提示。

use crate::models::{FileDescriptor, FilePatch, FileTree, GroupId, Layout, LoadState};
use crate::paths;
use crate::services::analyzer::{markers_value, syntax_check, SYNTAX_CHECK_KEY, YAK_LANGUAGE};
use crate::services::file::service::Result;
use crate::services::{
    AnalyzerBackend, FileService, HistoryEntry, KvStore, LayoutConfig, NoAnalyzer,
    ResourceBackend, RunnerHistory,
};

pub struct Workbench<B, S, A = NoAnalyzer> {
    layout: Layout,
    tree: FileTree,
    root: Option<String>,
    /// 当前展示的文件
    shown: Option<FileDescriptor>,
    files: FileService<B>,
    history: RunnerHistory<S>,
    analyzer: A,
    config: LayoutConfig,
}

impl<B: ResourceBackend, S: KvStore> Workbench<B, S> {
    pub fn new(backend: B, store: S, config: LayoutConfig) -> Self {
        Self {
            layout: Layout::new(),
            tree: FileTree::new(),
            root: None,
            shown: None,
            files: FileService::new(backend),
            history: RunnerHistory::new(store, &config),
            analyzer: NoAnalyzer,
            config,
        }
    }
}

impl<B: ResourceBackend, S: KvStore, A: AnalyzerBackend> Workbench<B, S, A> {
    /// 换用静态分析后端；之后打开的 yak 文件会带上 `syntaxCheck` 标记
    pub fn with_analyzer<T: AnalyzerBackend>(self, analyzer: T) -> Workbench<B, S, T> {
        Workbench {
            layout: self.layout,
            tree: self.tree,
            root: self.root,
            shown: self.shown,
            files: self.files,
            history: self.history,
            analyzer,
            config: self.config,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut FileTree {
        &mut self.tree
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn shown(&self) -> Option<&FileDescriptor> {
        self.shown.as_ref()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.entries()
    }

    fn record_history(&self, entry: HistoryEntry) {
        if let Err(error) = self.history.push(entry) {
            tracing::warn!(error = %error, "record history failed");
        }
    }

    /// 打开工作目录：重建文件树
    pub fn open_folder(&mut self, path: &str) -> Result<()> {
        let entries = self.files.list_dir(path)?;
        self.tree.set_roots(entries);
        self.root = Some(path.to_string());
        self.record_history(HistoryEntry::folder(path));
        tracing::info!(path = %path, "folder opened");
        Ok(())
    }

    /// 加载并展开目录
    pub fn expand_dir(&mut self, path: &str) -> Result<()> {
        let id = self.tree.find_node_by_path(path);
        if let Some(id) = id {
            self.tree.set_load_state(id, LoadState::Loading);
        }
        match self.files.list_dir(path) {
            Ok(entries) => {
                if let Err(error) = self.tree.set_children(path, entries) {
                    tracing::warn!(path = %path, error = %error, "expand_dir: tree not updated");
                }
                if let Some(id) = id {
                    self.tree.expand(id);
                }
                Ok(())
            }
            Err(error) => {
                if let Some(id) = id {
                    self.tree.set_load_state(id, LoadState::NotLoaded);
                }
                Err(error)
            }
        }
    }

    /// 打开文件：插入到当前展示文件之后并展示它。
    ///
    /// 新打开的文件补全语言；yak 文件附带静态分析标记。已经打开的文件只会被激活。
    pub fn open_file(&mut self, mut file: FileDescriptor) -> &FileDescriptor {
        if self.layout.find_file(&file.path).is_none() {
            self.prepare(&mut file);
        }
        let active = self.shown.as_ref().map(|f| f.path.clone());
        let shown = self.layout.add_file(file, active.as_deref());
        self.record_history(HistoryEntry::file(&shown.path));
        self.shown.insert(shown)
    }

    /// 按路径打开文件，内容从后端读取
    pub fn open_path(&mut self, path: &str) -> Result<&FileDescriptor> {
        if let Some(existing) = self.layout.find_file(path).cloned() {
            return Ok(self.open_file(existing));
        }
        let code = self.files.read_content(path)?;
        Ok(self.open_file(FileDescriptor::new(path).with_code(code)))
    }

    fn prepare(&self, file: &mut FileDescriptor) {
        if file.language.is_empty() {
            file.language = self.config.language_for(&file.name);
        }
        if file.language == YAK_LANGUAGE {
            let markers = syntax_check(&self.analyzer, &file.code);
            file.extra
                .insert(SYNTAX_CHECK_KEY.to_string(), markers_value(&markers));
        }
    }

    /// 重新分析打开的 yak 文件并更新标记。文件未打开或不是 yak 时返回 `false`
    pub fn check_syntax(&mut self, path: &str) -> bool {
        let Some(code) = self
            .layout
            .find_file(path)
            .filter(|f| f.language == YAK_LANGUAGE)
            .map(|f| f.code.clone())
        else {
            return false;
        };
        let markers = syntax_check(&self.analyzer, &code);
        let mut patch = FilePatch::default();
        patch
            .extra
            .insert(SYNTAX_CHECK_KEY.to_string(), markers_value(&markers));
        self.update_file(path, patch)
    }

    pub fn activate(&mut self, path: &str) -> bool {
        if !self.layout.set_active(path) {
            return false;
        }
        self.shown = self.layout.find_file(path).cloned();
        true
    }

    pub fn update_file(&mut self, path: &str, patch: FilePatch) -> bool {
        if !self.layout.update_file(path, patch) {
            return false;
        }
        self.sync_shown();
        true
    }

    pub fn close_file(&mut self, path: &str) -> Option<FileDescriptor> {
        let group = self.layout.group_of(path);
        let removed = self.layout.remove_file(path)?;
        self.after_close(group, [path]);
        Some(removed)
    }

    pub fn close_files<'p>(
        &mut self,
        paths: impl IntoIterator<Item = &'p str>,
    ) -> Vec<FileDescriptor> {
        let group = self.shown.as_ref().and_then(|f| self.layout.group_of(&f.path));
        let removed = self.layout.remove_files(paths);
        self.after_close(group, removed.iter().map(|f| f.path.as_str()));
        removed
    }

    fn after_close<'p>(
        &mut self,
        group: Option<GroupId>,
        closed: impl IntoIterator<Item = &'p str>,
    ) {
        self.shown = Layout::retain_shown(self.shown.take(), closed);
        if self.shown.is_some() {
            self.sync_shown();
            return;
        }
        let in_group = group.and_then(|id| {
            self.layout
                .groups()
                .find(|g| g.id() == id)
                .and_then(|g| g.active())
        });
        self.shown = in_group
            .or_else(|| self.layout.active_files().into_iter().next())
            .cloned();
    }

    fn sync_shown(&mut self) {
        if let Some(path) = self.shown.as_ref().map(|f| f.path.clone()) {
            self.shown = self.layout.find_file(&path).cloned();
        }
    }

    /// `path` 自身及其下所有已打开文件的路径（目录未在树中展开时也能找到）
    fn open_paths_within(&self, path: &str) -> Vec<String> {
        self.layout
            .groups()
            .flat_map(|g| g.files())
            .filter(|f| paths::is_within(&f.path, path))
            .map(|f| f.path.clone())
            .collect()
    }

    /// 保存打开文件的内容
    pub fn save_file(&mut self, path: &str) -> Result<()> {
        let Some(code) = self.layout.find_file(path).map(|f| f.code.clone()) else {
            tracing::debug!(path = %path, "save_file: path not open");
            return Ok(());
        };
        self.files.save(path, &code)?;
        self.update_file(
            path,
            FilePatch {
                is_dirty: Some(false),
                ..FilePatch::default()
            },
        );
        Ok(())
    }

    /// 重命名文件或目录，返回新路径；打开的后代文件同步改写路径
    pub fn rename_entry(&mut self, path: &str, new_name: &str) -> Result<String> {
        let parent = paths::parent(path).map(str::to_string);
        let new_path = match parent.as_deref() {
            Some(parent) => paths::join(parent, new_name),
            None => new_name.to_string(),
        };
        self.files.rename(path, new_name, parent.as_deref())?;

        let shown_path = self.shown.as_ref().map(|f| f.path.clone());
        let affected = self.open_paths_within(path);
        if let Err(error) = self.tree.rename_path(path, &new_path) {
            tracing::debug!(path = %path, error = %error, "rename_entry: not in tree");
        }
        let renamed = self
            .layout
            .rename_paths(affected.iter().map(String::as_str), path, &new_path);
        tracing::info!(from = %path, to = %new_path, renamed, "entry renamed");

        match shown_path {
            // 展示的文件确实被改名（旧路径已不在布局中）
            Some(old) if self.layout.find_file(&old).is_none() => {
                self.shown = paths::replace_prefix(&old, path, &new_path)
                    .and_then(|p| self.layout.find_file(&p).cloned());
            }
            _ => self.sync_shown(),
        }
        Ok(new_path)
    }

    /// 删除文件或目录，关闭其中所有打开的文件
    pub fn delete_entry(&mut self, path: &str) -> Result<Vec<FileDescriptor>> {
        self.files.delete(path)?;

        let affected = self.open_paths_within(path);
        if let Err(error) = self.tree.remove_path(path) {
            tracing::debug!(path = %path, error = %error, "delete_entry: not in tree");
        }
        Ok(self.close_files(affected.iter().map(String::as_str)))
    }

    /// 在目录下新建文件并打开
    pub fn create_file(
        &mut self,
        dir: &str,
        name: &str,
        code: Option<&str>,
    ) -> Result<&FileDescriptor> {
        let path = paths::join(dir, name);
        self.files.create_file(&path, code, Some(dir))?;
        self.refresh_dir(dir);

        let file = FileDescriptor::new(path).with_code(code.unwrap_or_default());
        Ok(self.open_file(file))
    }

    pub fn create_dir(&mut self, dir: &str, name: &str) -> Result<String> {
        let path = paths::join(dir, name);
        self.files.create_dir(&path, Some(dir))?;
        self.refresh_dir(dir);
        Ok(path)
    }

    fn refresh_dir(&mut self, dir: &str) {
        if self.root.as_deref() == Some(dir) {
            match self.files.list_dir(dir) {
                Ok(entries) => self.tree.refresh_roots(entries),
                Err(error) => tracing::warn!(path = %dir, error = %error, "refresh root failed"),
            }
            return;
        }
        if self.tree.find_node_by_path(dir).is_some() {
            if let Err(error) = self.expand_dir(dir) {
                tracing::warn!(path = %dir, error = %error, "refresh dir failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/workbench.rs"]
mod tests;
