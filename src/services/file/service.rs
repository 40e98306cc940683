//! 文件服务：通过资源后端完成列目录、读取、重命名、保存、新建与删除

use std::fmt;
use std::io;

use super::resource::{ResourceRequest, ResourceResponse};
use crate::models::file_tree::FileTreeEntry;

pub type Result<T> = std::result::Result<T, FileError>;

#[derive(Debug)]
pub enum FileError {
    Io(io::Error),
    Decode(serde_json::Error),
    /// 后端拒绝了请求
    Rejected(String),
    Unavailable(String),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Io(e) => write!(f, "IO error: {}", e),
            FileError::Decode(e) => write!(f, "Invalid response: {}", e),
            FileError::Rejected(msg) => write!(f, "Request rejected: {}", msg),
            FileError::Unavailable(msg) => write!(f, "Backend unavailable: {}", msg),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Io(e) => Some(e),
            FileError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FileError {
    fn from(e: io::Error) -> Self {
        FileError::Io(e)
    }
}

impl From<serde_json::Error> for FileError {
    fn from(e: serde_json::Error) -> Self {
        FileError::Decode(e)
    }
}

/// 资源后端：一次请求对应一次调用
pub trait ResourceBackend: Send + Sync {
    fn request(&self, request: &ResourceRequest) -> Result<ResourceResponse>;

    /// 读取文件内容；不支持读取的后端返回 `Unavailable`
    fn read_content(&self, path: &str) -> Result<String> {
        Err(FileError::Unavailable(format!("read {}", path)))
    }
}

impl<B: ResourceBackend + ?Sized> ResourceBackend for &B {
    fn request(&self, request: &ResourceRequest) -> Result<ResourceResponse> {
        (**self).request(request)
    }

    fn read_content(&self, path: &str) -> Result<String> {
        (**self).read_content(path)
    }
}

pub struct FileService<B> {
    backend: B,
}

impl<B: ResourceBackend> FileService<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn send(&self, request: ResourceRequest, parent: Option<&str>) -> Result<Vec<FileTreeEntry>> {
        match self.backend.request(&request) {
            Ok(response) => {
                tracing::debug!(
                    method = ?request.method,
                    path = %request.url.path,
                    resources = response.resources.len(),
                    "resource request done"
                );
                Ok(response.into_entries(parent))
            }
            Err(error) => {
                tracing::warn!(
                    method = ?request.method,
                    path = %request.url.path,
                    error = %error,
                    "resource request failed"
                );
                Err(error)
            }
        }
    }

    pub fn read_content(&self, path: &str) -> Result<String> {
        self.backend.read_content(path).inspect_err(|error| {
            tracing::warn!(path = %path, error = %error, "read file content failed");
        })
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<FileTreeEntry>> {
        self.send(ResourceRequest::list(path), Some(path))
    }

    pub fn rename(
        &self,
        path: &str,
        new_name: &str,
        parent: Option<&str>,
    ) -> Result<Vec<FileTreeEntry>> {
        self.send(ResourceRequest::rename(path, new_name), parent)
    }

    pub fn save(&self, path: &str, content: &str) -> Result<Vec<FileTreeEntry>> {
        self.send(ResourceRequest::save(path, content), Some(path))
    }

    pub fn create_file(
        &self,
        path: &str,
        content: Option<&str>,
        parent: Option<&str>,
    ) -> Result<Vec<FileTreeEntry>> {
        self.send(ResourceRequest::create_file(path, content), parent)
    }

    pub fn create_dir(&self, path: &str, parent: Option<&str>) -> Result<Vec<FileTreeEntry>> {
        self.send(ResourceRequest::create_dir(path), parent)
    }

    pub fn delete(&self, path: &str) -> Result<Vec<FileTreeEntry>> {
        self.send(ResourceRequest::delete(path), Some(path))
    }
}
