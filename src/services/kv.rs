//! 键值存储
//!
//! 保存少量 JSON 序列化的状态（例如最近打开记录）。文件存储的默认位置：
//! - macOS: ~/Library/Application Support/runner-layout/kv.json
//! - Linux: ~/.local/share/runner-layout/kv.json
//! - Windows: %APPDATA%\runner-layout\kv.json

use rustc_hash::FxHashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const APP_NAME: &str = "runner-layout";
const KV_FILE: &str = "kv.json";

#[derive(Debug)]
pub enum KvError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for KvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvError::Io(e) => write!(f, "IO error: {}", e),
            KvError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for KvError {}

impl From<io::Error> for KvError {
    fn from(e: io::Error) -> Self {
        KvError::Io(e)
    }
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Json(e)
    }
}

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String) -> Result<(), KvError>;
}

impl<S: KvStore + ?Sized> KvStore for &S {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        (**self).set(key, value)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    values: Mutex<FxHashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }
}

/// 以单个 JSON 对象文件保存的键值存储，每次写入整体落盘
#[derive(Debug)]
pub struct JsonFileKvStore {
    path: PathBuf,
    values: Mutex<FxHashMap<String, String>>,
}

impl JsonFileKvStore {
    /// 打开存储文件；文件不存在或内容无效时从空存储开始
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|error| {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "kv file invalid, starting empty"
                );
                FxHashMap::default()
            }),
            Err(_) => FxHashMap::default(),
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn open_default() -> io::Result<Self> {
        let path = default_kv_path().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Cannot determine data directory")
        })?;
        Ok(Self::open(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &FxHashMap<String, String>) -> Result<(), KvError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for JsonFileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value);
        self.persist(&values)
    }
}

/// 获取应用数据目录
pub fn app_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library/Application Support").join(APP_NAME))
    }

    #[cfg(target_os = "linux")]
    {
        // 优先使用 XDG_DATA_HOME，否则使用 ~/.local/share
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            Some(PathBuf::from(xdg).join(APP_NAME))
        } else {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".local/share").join(APP_NAME))
        }
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join(APP_NAME))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

pub fn default_kv_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(KV_FILE))
}
