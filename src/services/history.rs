//! 最近打开记录
//!
//! 以 JSON 数组保存在键值存储中，最新的在前，按路径去重

use serde::{Deserialize, Serialize};

use super::config::LayoutConfig;
use super::kv::{KvError, KvStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub is_file: bool,
}

impl HistoryEntry {
    pub fn file(path: &str) -> Self {
        Self {
            path: path.to_string(),
            name: crate::paths::file_name(path).to_string(),
            is_file: true,
        }
    }

    pub fn folder(path: &str) -> Self {
        Self {
            is_file: false,
            ..Self::file(path)
        }
    }
}

pub struct RunnerHistory<S> {
    store: S,
    key: String,
    limit: usize,
}

impl<S: KvStore> RunnerHistory<S> {
    pub fn new(store: S, config: &LayoutConfig) -> Self {
        Self {
            store,
            key: config.history_key.clone(),
            limit: config.history_limit,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 读取记录；不存在或无法解析时返回空
    pub fn entries(&self) -> Vec<HistoryEntry> {
        let Some(data) = self.store.get(&self.key) else {
            return Vec::new();
        };
        serde_json::from_str(&data).unwrap_or_else(|error| {
            tracing::debug!(key = %self.key, error = %error, "history unreadable");
            Vec::new()
        })
    }

    /// 记录一次打开：放到最前面，去掉同路径的旧记录，并截断到上限。返回新的记录列表
    pub fn push(&self, entry: HistoryEntry) -> Result<Vec<HistoryEntry>, KvError> {
        let mut entries = self.entries();
        entries.retain(|e| e.path != entry.path);
        entries.insert(0, entry);
        entries.truncate(self.limit);

        let data = serde_json::to_string(&entries)?;
        self.store.set(&self.key, data)?;
        Ok(entries)
    }

    pub fn clear(&self) -> Result<(), KvError> {
        self.store.set(&self.key, "[]".to_string())
    }
}
