//! 分栏布局数据模型
//!
//! 布局由若干分栏（Area）组成，每个分栏包含若干 tab 组（TabGroup），每个 tab 组按显示顺序
//! 保存打开的文件。文件本身存放在 arena 中，分栏与 tab 组只保存 key 列表：
//! - 路径在整个布局中唯一（`by_path` 索引保证）
//! - 每个 tab 组最多一个激活文件
//! - 任何修改之后不存在空的 tab 组，也不存在空的分栏
//!
//! 所有操作都不会失败：引用了不存在路径的操作是 no-op，只记录日志。

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Deserializer, Serialize};
use slotmap::{new_key_type, SlotMap};

use super::file::{FileDescriptor, FilePatch};
use crate::paths;

new_key_type! { struct FileKey; }

/// tab 组标识：创建时分配，单调递增，不复用
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u64);

impl GroupId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct TabGroup {
    id: GroupId,
    files: Vec<FileKey>,
}

#[derive(Debug, Clone, Default)]
struct Area {
    groups: Vec<TabGroup>,
}

/// 文件在布局中的位置：(分栏, tab 组, tab)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Slot {
    area: usize,
    group: usize,
    index: usize,
}

#[derive(Debug, Clone)]
pub struct Layout {
    files: SlotMap<FileKey, FileDescriptor>,
    by_path: FxHashMap<String, FileKey>,
    areas: Vec<Area>,
    next_group_id: u64,
    version: u64,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

fn deactivate_all(files: &mut SlotMap<FileKey, FileDescriptor>, keys: &[FileKey]) {
    for key in keys {
        if let Some(file) = files.get_mut(*key) {
            file.is_active = false;
        }
    }
}

impl Layout {
    pub fn new() -> Self {
        Self {
            files: SlotMap::with_key(),
            by_path: FxHashMap::default(),
            areas: Vec::new(),
            next_group_id: 1,
            version: 0,
        }
    }

    /// 每次实际修改布局都会递增，UI 层据此判断是否需要重绘
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// 打开的文件数
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    fn bump(&mut self) {
        self.version = self.version.saturating_add(1);
    }

    fn alloc_group_id(&mut self) -> GroupId {
        let id = GroupId::new(self.next_group_id);
        self.next_group_id = self.next_group_id.saturating_add(1);
        id
    }

    fn locate(&self, path: &str) -> Option<Slot> {
        let key = *self.by_path.get(path)?;
        for (area_idx, area) in self.areas.iter().enumerate() {
            for (group_idx, group) in area.groups.iter().enumerate() {
                if let Some(index) = group.files.iter().position(|k| *k == key) {
                    return Some(Slot {
                        area: area_idx,
                        group: group_idx,
                        index,
                    });
                }
            }
        }
        None
    }

    fn insert_descriptor(&mut self, file: FileDescriptor) -> FileKey {
        let path = file.path.clone();
        let key = self.files.insert(file);
        self.by_path.insert(path, key);
        key
    }

    /// 打开文件
    ///
    /// - 指定了 `active` 且它在布局中：插入到它所在 tab 组中它的后面，组内其它文件取消激活
    /// - 布局为空：新建一个分栏和一个 tab 组
    /// - 未指定 `active`：第一个分栏的第一个 tab 组全部取消激活，追加到末尾
    ///
    /// 新文件的 `is_active` 保持调用方给定的值。路径已打开时不会重复插入，
    /// 而是激活已有的文件并返回它。返回值是调用方应当展示的文件。
    pub fn add_file(&mut self, file: FileDescriptor, active: Option<&str>) -> FileDescriptor {
        if let Some(existing) = self.by_path.get(&file.path).copied() {
            tracing::debug!(path = %file.path, "file already open, activating");
            self.set_active(&file.path);
            return self.files.get(existing).cloned().unwrap_or(file);
        }

        let shown = file.clone();
        match active {
            Some(active_path) if !self.areas.is_empty() => {
                let Some(slot) = self.locate(active_path) else {
                    tracing::warn!(
                        path = %file.path,
                        active = %active_path,
                        "active file not in layout, skip open"
                    );
                    return shown;
                };
                let key = self.insert_descriptor(file);
                let group = &mut self.areas[slot.area].groups[slot.group];
                deactivate_all(&mut self.files, &group.files);
                group.files.insert(slot.index + 1, key);
            }
            _ if self.areas.is_empty() => {
                let id = self.alloc_group_id();
                let key = self.insert_descriptor(file);
                self.areas.push(Area {
                    groups: vec![TabGroup {
                        id,
                        files: vec![key],
                    }],
                });
            }
            _ => {
                let key = self.insert_descriptor(file);
                let group = &mut self.areas[0].groups[0];
                deactivate_all(&mut self.files, &group.files);
                group.files.push(key);
            }
        }

        self.bump();
        shown
    }

    /// 关闭单个文件
    ///
    /// 组内还有其它文件时只移除该文件；若它是激活的，激活它左边的 tab（没有则激活第一个）。
    /// 它是组内唯一文件时移除整个 tab 组，tab 组也是分栏内唯一的则移除整个分栏。
    pub fn remove_file(&mut self, path: &str) -> Option<FileDescriptor> {
        let Some(slot) = self.locate(path) else {
            tracing::debug!(path = %path, "remove_file: path not open");
            return None;
        };

        let area = &mut self.areas[slot.area];
        if area.groups[slot.group].files.len() > 1 {
            let group = &mut area.groups[slot.group];
            let key = group.files.remove(slot.index);
            let was_active = self.files.get(key).is_some_and(|f| f.is_active);
            if was_active {
                let next = slot.index.saturating_sub(1);
                if let Some(file) = group.files.get(next).and_then(|k| self.files.get_mut(*k)) {
                    file.is_active = true;
                }
            }
        } else if area.groups.len() > 1 {
            area.groups.remove(slot.group);
        } else {
            self.areas.remove(slot.area);
        }

        let key = self.by_path.remove(path)?;
        let removed = self.files.remove(key);
        self.bump();
        removed
    }

    /// 批量关闭文件
    ///
    /// 先过滤每个 tab 组的文件，再移除空的 tab 组，最后移除空的分栏。
    /// 若某个 tab 组失去了激活文件且组内已无激活文件，激活剩下的第一个文件。
    /// 返回被关闭的文件，顺序为布局遍历顺序。
    pub fn remove_files<'p>(
        &mut self,
        paths: impl IntoIterator<Item = &'p str>,
    ) -> Vec<FileDescriptor> {
        let targets: FxHashSet<&str> = paths.into_iter().collect();
        if targets.is_empty() {
            return Vec::new();
        }

        let mut removed_keys = Vec::new();
        for area in &mut self.areas {
            for group in &mut area.groups {
                let mut lost_active = false;
                group.files.retain(|key| match self.files.get(*key) {
                    Some(file) if targets.contains(file.path.as_str()) => {
                        lost_active |= file.is_active;
                        removed_keys.push(*key);
                        false
                    }
                    Some(_) => true,
                    None => false,
                });

                let has_active = group
                    .files
                    .iter()
                    .any(|k| self.files.get(*k).is_some_and(|f| f.is_active));
                if lost_active && !has_active {
                    if let Some(file) = group.files.first().and_then(|k| self.files.get_mut(*k)) {
                        file.is_active = true;
                    }
                }
            }
            area.groups.retain(|group| !group.files.is_empty());
        }
        self.areas.retain(|area| !area.groups.is_empty());

        let mut removed = Vec::with_capacity(removed_keys.len());
        for key in removed_keys {
            if let Some(file) = self.files.remove(key) {
                self.by_path.remove(&file.path);
                removed.push(file);
            }
        }

        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "closed files");
            self.bump();
        }
        removed
    }

    /// 激活文件：所在 tab 组其它文件取消激活。路径不存在时返回 `false`
    pub fn set_active(&mut self, path: &str) -> bool {
        let Some(slot) = self.locate(path) else {
            tracing::debug!(path = %path, "set_active: path not open");
            return false;
        };

        let group = &self.areas[slot.area].groups[slot.group];
        deactivate_all(&mut self.files, &group.files);
        if let Some(file) = self.files.get_mut(group.files[slot.index]) {
            file.is_active = true;
        }
        self.bump();
        true
    }

    /// 文件夹重命名后同步打开文件的 `path` 与 `parent`
    ///
    /// 只处理 `affected` 中的路径，前缀按路径段匹配。路径恰好等于 `old_prefix` 的文件
    /// （即被重命名的就是它自己）同时更新 `name`。与其它已打开路径冲突的文件保持不变。
    /// 返回实际改写的文件数。
    pub fn rename_paths<'p>(
        &mut self,
        affected: impl IntoIterator<Item = &'p str>,
        old_prefix: &str,
        new_prefix: &str,
    ) -> usize {
        let mut seen = FxHashSet::default();
        let mut renamed = 0;

        for path in affected {
            if !seen.insert(path) {
                continue;
            }
            let Some(key) = self.by_path.get(path).copied() else {
                continue;
            };
            let Some(new_path) = paths::replace_prefix(path, old_prefix, new_prefix) else {
                tracing::debug!(
                    path = %path,
                    prefix = %old_prefix,
                    "rename: prefix does not match"
                );
                continue;
            };
            if new_path == path {
                continue;
            }
            if self.by_path.contains_key(&new_path) {
                tracing::warn!(from = %path, to = %new_path, "rename: target path already open");
                continue;
            }
            let Some(file) = self.files.get_mut(key) else {
                continue;
            };

            file.parent = file.parent.take().map(|parent| {
                paths::replace_prefix(&parent, old_prefix, new_prefix).unwrap_or(parent)
            });
            if path == old_prefix {
                file.name = paths::file_name(&new_path).to_string();
            }
            file.path = new_path.clone();

            self.by_path.remove(path);
            self.by_path.insert(new_path, key);
            renamed += 1;
        }

        if renamed > 0 {
            tracing::debug!(from = %old_prefix, to = %new_prefix, renamed, "renamed open files");
            self.bump();
        }
        renamed
    }

    /// 局部更新打开文件的内容或元数据，位置与激活状态不变
    pub fn update_file(&mut self, path: &str, patch: FilePatch) -> bool {
        let Some(file) = self.by_path.get(path).and_then(|k| self.files.get_mut(*k)) else {
            return false;
        };
        file.apply(patch);
        self.bump();
        true
    }

    pub fn find_file(&self, path: &str) -> Option<&FileDescriptor> {
        self.by_path.get(path).and_then(|k| self.files.get(*k))
    }

    /// 查找一组路径，结果按布局遍历顺序（分栏、tab 组、tab）排列
    pub fn find_files<'p>(&self, paths: impl IntoIterator<Item = &'p str>) -> Vec<&FileDescriptor> {
        let targets: FxHashSet<&str> = paths.into_iter().collect();
        self.files_in_order()
            .filter(|file| targets.contains(file.path.as_str()))
            .collect()
    }

    pub fn group_of(&self, path: &str) -> Option<GroupId> {
        let slot = self.locate(path)?;
        Some(self.areas[slot.area].groups[slot.group].id)
    }

    /// 每个 tab 组的激活文件，按遍历顺序
    pub fn active_files(&self) -> Vec<&FileDescriptor> {
        self.groups().filter_map(|group| group.active()).collect()
    }

    pub fn groups(&self) -> impl Iterator<Item = GroupRef<'_>> + '_ {
        self.areas
            .iter()
            .flat_map(|area| area.groups.iter())
            .map(move |group| GroupRef {
                layout: self,
                group,
            })
    }

    pub fn groups_in(&self, area: usize) -> impl Iterator<Item = GroupRef<'_>> + '_ {
        self.areas
            .get(area)
            .into_iter()
            .flat_map(|area| area.groups.iter())
            .map(move |group| GroupRef {
                layout: self,
                group,
            })
    }

    fn files_in_order(&self) -> impl Iterator<Item = &FileDescriptor> + '_ {
        self.groups().flat_map(|group| group.files())
    }

    /// 导出嵌套结构（分栏 → tab 组 → 文件），用于渲染与持久化
    pub fn snapshot(&self) -> LayoutSnapshot {
        let areas = self
            .areas
            .iter()
            .enumerate()
            .map(|(idx, _)| AreaSnapshot {
                elements: self
                    .groups_in(idx)
                    .map(|group| GroupSnapshot {
                        id: group.id(),
                        files: group.files().cloned().collect(),
                    })
                    .collect(),
            })
            .collect();
        LayoutSnapshot { areas }
    }

    /// 从快照恢复
    ///
    /// 恢复过程中重新建立约束：重复路径只保留第一次出现，组内多余的激活标记被清除，
    /// 空的 tab 组与分栏被丢弃，重复的 tab 组 id 重新分配。
    pub fn from_snapshot(snapshot: LayoutSnapshot) -> Self {
        let mut layout = Self::new();
        let max_id = snapshot
            .areas
            .iter()
            .flat_map(|area| area.elements.iter())
            .map(|group| group.id.raw())
            .max()
            .unwrap_or(0);
        layout.next_group_id = max_id.saturating_add(1).max(1);

        let mut used_ids = FxHashSet::default();
        for area in snapshot.areas {
            let mut groups = Vec::with_capacity(area.elements.len());
            for element in area.elements {
                let mut keys = Vec::with_capacity(element.files.len());
                let mut has_active = false;
                for mut file in element.files {
                    if layout.by_path.contains_key(&file.path) {
                        tracing::warn!(path = %file.path, "snapshot: duplicate path dropped");
                        continue;
                    }
                    if file.is_active && has_active {
                        file.is_active = false;
                    }
                    has_active |= file.is_active;
                    keys.push(layout.insert_descriptor(file));
                }
                if keys.is_empty() {
                    continue;
                }
                let id = if element.id.raw() != 0 && used_ids.insert(element.id) {
                    element.id
                } else {
                    layout.alloc_group_id()
                };
                used_ids.insert(id);
                groups.push(TabGroup { id, files: keys });
            }
            if !groups.is_empty() {
                layout.areas.push(Area { groups });
            }
        }
        layout
    }

    /// 调用方当前展示的文件若已被关闭，则清空
    pub fn retain_shown<'p>(
        shown: Option<FileDescriptor>,
        closed: impl IntoIterator<Item = &'p str>,
    ) -> Option<FileDescriptor> {
        let shown = shown?;
        if closed.into_iter().any(|path| path == shown.path) {
            None
        } else {
            Some(shown)
        }
    }
}

/// 只读的 tab 组视图
#[derive(Clone, Copy)]
pub struct GroupRef<'a> {
    layout: &'a Layout,
    group: &'a TabGroup,
}

impl<'a> GroupRef<'a> {
    pub fn id(&self) -> GroupId {
        self.group.id
    }

    pub fn len(&self) -> usize {
        self.group.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group.files.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &'a FileDescriptor> + 'a {
        let layout = self.layout;
        self.group
            .files
            .iter()
            .filter_map(move |key| layout.files.get(*key))
    }

    pub fn active(&self) -> Option<&'a FileDescriptor> {
        self.files().find(|file| file.is_active)
    }

    pub fn paths(&self) -> Vec<&'a str> {
        self.files().map(|file| file.path.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutSnapshot {
    pub areas: Vec<AreaSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaSnapshot {
    pub elements: Vec<GroupSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    /// 写出时总是数字；读取时也接受字符串 id（例如 uuid），无法解析为数字的按 0 处理，
    /// 恢复时重新分配
    #[serde(deserialize_with = "deserialize_group_id")]
    pub id: GroupId,
    pub files: Vec<FileDescriptor>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGroupId {
    Number(u64),
    Text(String),
}

fn deserialize_group_id<'de, D>(deserializer: D) -> Result<GroupId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match RawGroupId::deserialize(deserializer)? {
        RawGroupId::Number(raw) => raw,
        RawGroupId::Text(text) => text.parse().unwrap_or(0),
    };
    Ok(GroupId::new(raw))
}

#[cfg(test)]
#[path = "../../tests/unit/models/layout.rs"]
mod tests;
