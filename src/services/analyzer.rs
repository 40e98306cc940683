//! 静态分析
//!
//! 打开 yak 脚本时把代码交给分析后端，结果转成编辑器标记存到文件的 `syntaxCheck` 字段。
//! 分析失败不影响打开文件，只得到空的标记列表。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::file::service::{FileError, Result};

pub const YAK_LANGUAGE: &str = "yak";
pub const SYNTAX_CHECK_KEY: &str = "syntaxCheck";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StaticAnalyzeRequest {
    pub code: Vec<u8>,
    pub plugin_type: String,
}

impl StaticAnalyzeRequest {
    pub fn yak(code: &str) -> Self {
        Self {
            code: code.as_bytes().to_vec(),
            plugin_type: YAK_LANGUAGE.to_string(),
        }
    }
}

/// 分析后端返回的一条问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StaticAnalyzeError {
    pub message: String,
    #[serde(default)]
    pub severity: String,
    pub start_line_number: u32,
    pub start_column: u32,
    pub end_line_number: u32,
    pub end_column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MarkerSeverity {
    Hint = 1,
    Info = 2,
    Warning = 4,
    Error = 8,
}

impl MarkerSeverity {
    fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "warning" | "warn" => MarkerSeverity::Warning,
            "hint" => MarkerSeverity::Hint,
            "info" | "information" => MarkerSeverity::Info,
            _ => MarkerSeverity::Error,
        }
    }
}

impl From<MarkerSeverity> for u8 {
    fn from(severity: MarkerSeverity) -> Self {
        severity as u8
    }
}

impl TryFrom<u8> for MarkerSeverity {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, String> {
        match value {
            1 => Ok(MarkerSeverity::Hint),
            2 => Ok(MarkerSeverity::Info),
            4 => Ok(MarkerSeverity::Warning),
            8 => Ok(MarkerSeverity::Error),
            other => Err(format!("unknown marker severity: {other}")),
        }
    }
}

/// 编辑器标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxMarker {
    pub message: String,
    pub severity: MarkerSeverity,
    pub start_line_number: u32,
    pub start_column: u32,
    pub end_line_number: u32,
    pub end_column: u32,
}

impl From<StaticAnalyzeError> for SyntaxMarker {
    fn from(error: StaticAnalyzeError) -> Self {
        Self {
            severity: MarkerSeverity::from_label(&error.severity),
            message: error.message,
            start_line_number: error.start_line_number,
            start_column: error.start_column,
            end_line_number: error.end_line_number,
            end_column: error.end_column,
        }
    }
}

pub trait AnalyzerBackend: Send + Sync {
    fn static_analyze(&self, request: &StaticAnalyzeRequest) -> Result<Vec<StaticAnalyzeError>>;
}

impl<A: AnalyzerBackend + ?Sized> AnalyzerBackend for &A {
    fn static_analyze(&self, request: &StaticAnalyzeRequest) -> Result<Vec<StaticAnalyzeError>> {
        (**self).static_analyze(request)
    }
}

/// 没有分析后端时使用，所有请求都返回 `Unavailable`
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnalyzer;

impl AnalyzerBackend for NoAnalyzer {
    fn static_analyze(&self, _request: &StaticAnalyzeRequest) -> Result<Vec<StaticAnalyzeError>> {
        Err(FileError::Unavailable("static analyzer".to_string()))
    }
}

/// 分析代码并返回标记；失败时返回空列表
pub fn syntax_check<A: AnalyzerBackend>(analyzer: &A, code: &str) -> Vec<SyntaxMarker> {
    match analyzer.static_analyze(&StaticAnalyzeRequest::yak(code)) {
        Ok(errors) => errors.into_iter().map(SyntaxMarker::from).collect(),
        Err(error) => {
            tracing::debug!(error = %error, "static analyze failed, no markers");
            Vec::new()
        }
    }
}

/// 标记列表转为可以放进 `FileDescriptor::extra` 的值
pub fn markers_value(markers: &[SyntaxMarker]) -> Value {
    serde_json::to_value(markers).unwrap_or_else(|_| Value::Array(Vec::new()))
}
