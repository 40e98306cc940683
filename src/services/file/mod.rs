//! 文件服务模块
//!
//! 文件操作都交给资源后端执行，这里构造请求并把返回的资源列表转为文件树记录

pub mod resource;
pub mod service;

pub use resource::{
    Method, QueryParam, ResourceDescriptor, ResourceRequest, ResourceResponse, ResourceUrl,
};
pub use service::{FileError, FileService, ResourceBackend};
