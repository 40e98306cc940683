//! 日志初始化
//!
//! 日志写入按天滚动的文件。宿主需要在界面上显示日志时，可以额外开启一个有界的尾部通道：
//! 通道满了就丢弃新行并计数，不会无限堆积。

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryIter, TrySendError};
use std::sync::Arc;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "runner-layout.log";
const DEFAULT_FILTER: &str = "runner_layout=info";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// 为空时写到应用数据目录下的 `logs`
    pub log_dir: Option<PathBuf>,
    /// 尾部通道容量；`None` 表示不开启
    pub tail_capacity: Option<usize>,
}

/// 最近日志行的接收端
pub struct LogTail {
    rx: Receiver<String>,
    dropped: Arc<AtomicUsize>,
}

impl LogTail {
    pub fn try_iter(&self) -> TryIter<'_, String> {
        self.rx.try_iter()
    }

    /// 因通道已满被丢弃的行数
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct LoggingGuard {
    _guard: WorkerGuard,
    log_dir: PathBuf,
    tail: Option<LogTail>,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn take_tail(&mut self) -> Option<LogTail> {
        self.tail.take()
    }
}

#[derive(Clone)]
struct TailMakeWriter {
    tx: SyncSender<String>,
    dropped: Arc<AtomicUsize>,
}

/// 一条事件的输出先缓存，写完（drop）时按行投递
struct TailWriter {
    buf: Vec<u8>,
    tx: SyncSender<String>,
    dropped: Arc<AtomicUsize>,
}

impl<'a> MakeWriter<'a> for TailMakeWriter {
    type Writer = TailWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TailWriter {
            buf: Vec::with_capacity(256),
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl Write for TailWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for TailWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        for line in text.lines() {
            match self.tx.try_send(line.to_string()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

type TailLayer<S> = tracing_subscriber::fmt::Layer<S, DefaultFields, Format, TailMakeWriter>;

fn tail_layer<S>(capacity: usize) -> (TailLayer<S>, LogTail) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    let dropped = Arc::new(AtomicUsize::new(0));
    let writer = TailMakeWriter {
        tx,
        dropped: Arc::clone(&dropped),
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);
    (layer, LogTail { rx, dropped })
}

fn resolve_log_dir(log_dir: Option<&Path>) -> io::Result<PathBuf> {
    let dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => crate::services::kv::app_data_dir()
            .map(|dir| dir.join("logs"))
            .unwrap_or_else(|| std::env::temp_dir().join("runner-layout").join("logs")),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// 安装全局 tracing 订阅者。
///
/// 已经安装过订阅者或日志目录不可用时返回 `None`。panic 时先记录日志，再交给原有的 hook。
pub fn init(options: LogOptions) -> Option<LoggingGuard> {
    let log_dir = resolve_log_dir(options.log_dir.as_deref()).ok()?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let (tail, tail_writer) = match options.tail_capacity {
        Some(capacity) => {
            let (layer, tail) = tail_layer(capacity);
            (Some(tail), Some(layer))
        }
        None => (None, None),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(tail_writer);

    if subscriber.try_init().is_err() {
        return None;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!(panic = %panic_info, "panic");
        previous(panic_info);
    }));

    tracing::info!(log_dir = %log_dir.display(), "tracing initialized");

    Some(LoggingGuard {
        _guard: guard,
        log_dir,
        tail,
    })
}
