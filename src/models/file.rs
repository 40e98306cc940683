//! 打开文件描述

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::paths;

/// 一个打开的文件（一个 tab）
///
/// `extra` 保存调用方附带的任意字段（例如语法检查标记），布局操作原样保留。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub path: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub name: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_dirty: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileDescriptor {
    /// 由路径构造：`name` 与 `parent` 从路径推导，默认激活
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = paths::file_name(&path).to_string();
        let parent = paths::parent(&path).map(str::to_string);
        Self {
            path,
            parent,
            name,
            language: String::new(),
            code: String::new(),
            is_active: true,
            is_dirty: false,
            extra: Map::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn apply(&mut self, patch: FilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(code) = patch.code {
            self.code = code;
        }
        if let Some(dirty) = patch.is_dirty {
            self.is_dirty = dirty;
        }
        self.extra.extend(patch.extra);
    }
}

/// 对打开文件的局部更新，`None` 字段保持不变
///
/// 不包含 `path` 与 `is_active`：路径变化走 `Layout::rename_paths`，激活走 `Layout::set_active`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dirty: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilePatch {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }
}
