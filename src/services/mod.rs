//! 服务层模块
//!
//! - FileService: 通过资源后端访问文件
//! - RunnerHistory: 最近打开记录
//! - KvStore: 键值存储
//! - AnalyzerBackend: 静态分析
//! - LayoutConfig: 布局配置

pub mod analyzer;
pub mod config;
pub mod file;
pub mod history;
pub mod kv;

pub use analyzer::{AnalyzerBackend, NoAnalyzer, SyntaxMarker};
pub use config::LayoutConfig;
pub use file::{FileError, FileService, ResourceBackend, ResourceRequest, ResourceResponse};
pub use history::{HistoryEntry, RunnerHistory};
pub use kv::{JsonFileKvStore, KvError, KvStore, MemoryKvStore};
