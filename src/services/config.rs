//! 布局相关配置
//!
//! 从 JSON 文件加载，文件缺失或无效时使用默认值

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_HISTORY_KEY: &str = "YakRunnerOpenHistory";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// 最近打开记录的最大条数
    pub history_limit: usize,
    pub history_key: String,
    /// 没有后缀的文件使用的语言
    pub default_language: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            default_language: "yak".to_string(),
        }
    }
}

impl LayoutConfig {
    /// 从 JSON 文件加载；文件缺失或无效时使用默认值，缺少的字段取默认值
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|error| {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "invalid config, using defaults"
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn language_for(&self, name: &str) -> String {
        crate::paths::suffix(name)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_language.clone())
    }
}
