//! 资源请求协议
//!
//! 文件操作统一走一个请求形状：`{Method, Url: {Schema, Query, Path}, Body?}`，
//! 返回资源列表。这里只负责构造请求与解析响应。

use serde::{Deserialize, Serialize};

use crate::models::file_tree::{sort_dirs_first, FileTreeEntry};

pub const FILE_SCHEMA: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryParam {
    pub key: String,
    pub value: String,
}

impl QueryParam {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceUrl {
    pub schema: String,
    #[serde(default)]
    pub query: Vec<QueryParam>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRequest {
    pub method: Method,
    pub url: ResourceUrl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
}

impl ResourceRequest {
    fn file(method: Method, path: &str, query: Vec<QueryParam>) -> Self {
        Self {
            method,
            url: ResourceUrl {
                schema: FILE_SCHEMA.to_string(),
                query,
                path: path.to_string(),
            },
            body: None,
        }
    }

    pub fn list(path: &str) -> Self {
        Self::file(Method::Get, path, vec![QueryParam::new("op", "list")])
    }

    pub fn rename(path: &str, new_name: &str) -> Self {
        Self::file(
            Method::Post,
            path,
            vec![
                QueryParam::new("op", "rename"),
                QueryParam::new("newname", new_name),
            ],
        )
    }

    pub fn save(path: &str, content: &str) -> Self {
        let mut request = Self::file(Method::Post, path, vec![QueryParam::new("op", "content")]);
        request.body = Some(content.as_bytes().to_vec());
        request
    }

    /// 新建文件；只有内容非空时才携带 body
    pub fn create_file(path: &str, content: Option<&str>) -> Self {
        let mut request = Self::file(Method::Put, path, vec![QueryParam::new("type", "file")]);
        request.body = content
            .filter(|c| !c.is_empty())
            .map(|c| c.as_bytes().to_vec());
        request
    }

    pub fn create_dir(path: &str) -> Self {
        Self::file(Method::Put, path, vec![QueryParam::new("type", "dir")])
    }

    pub fn delete(path: &str) -> Self {
        Self::file(Method::Delete, path, Vec::new())
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.url
            .query
            .iter()
            .find(|q| q.key == key)
            .map(|q| q.value.as_str())
    }
}

pub const DIR_RESOURCE_TYPE: &str = "dir";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceDescriptor {
    pub resource_name: String,
    /// `"dir"` 表示目录，空字符串表示文件
    #[serde(default)]
    pub resource_type: String,
    pub path: String,
    #[serde(default)]
    pub have_children_nodes: bool,
}

impl ResourceDescriptor {
    pub fn is_dir(&self) -> bool {
        self.resource_type == DIR_RESOURCE_TYPE
    }

    pub fn to_entry(&self, parent: Option<&str>) -> FileTreeEntry {
        FileTreeEntry::new(
            parent,
            &self.resource_name,
            &self.path,
            self.is_dir(),
            self.have_children_nodes,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceResponse {
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

impl ResourceResponse {
    /// 转为文件树记录：目录在前，其余保持后端返回的顺序
    pub fn into_entries(self, parent: Option<&str>) -> Vec<FileTreeEntry> {
        let mut entries: Vec<FileTreeEntry> = self
            .resources
            .iter()
            .map(|resource| resource.to_entry(parent))
            .collect();
        sort_dirs_first(&mut entries);
        entries
    }
}
