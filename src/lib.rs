//! runner-layout - 脚本编辑器的标签页布局库
//!
//! 模块结构：
//! - models: 数据模型（Layout, FileDescriptor, FileTree）
//! - services: 服务层（FileService, AnalyzerBackend, RunnerHistory, KvStore, LayoutConfig）
//! - workbench: 把布局、文件树与服务串起来的工作台
//! - paths: 路径字符串工具
//! - logging: tracing 初始化

pub mod logging;
pub mod models;
pub mod paths;
pub mod services;
pub mod workbench;

pub use models::{FileDescriptor, FilePatch, GroupId, Layout, LayoutSnapshot};
pub use workbench::Workbench;
