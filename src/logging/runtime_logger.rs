// src/logging/runtime_logger.rs

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration as StdDuration, SystemTime};
use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task;
use tokio::time::{self, Duration};
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::MakeWriter;

use crate::logging::frame_log::FrameLog;

/// 渲染帧日志单独写入的“级别”
pub const FRAME_LEVEL: &str = "FRAME";

const LEVELS: [&str; 6] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR", FRAME_LEVEL];

/// 单条日志消息
pub struct LogEntry {
    pub level: String,
    pub content: String,
}

enum LogMessage {
    Entry(LogEntry),
    /// 立即刷盘，完成后回执
    Flush(oneshot::Sender<()>),
}

/// 运行日志管理器（RuntimeLogger）
/// 将运行时日志按日志级别分流到不同的日志文件中，渲染帧写入 `{prefix}_frame.json`。
pub struct RuntimeLogger {
    sender: Sender<LogMessage>,
    log_dir: PathBuf,
}

impl RuntimeLogger {
    /// 创建一个新的 RuntimeLogger
    ///
    /// - `log_dir`: 日志文件存放目录
    /// - `file_prefix`: 文件前缀，例如 "runtime"（最终文件名形如 runtime_info.json 等）
    /// - `buffer_size`: mpsc 通道缓冲区大小
    /// - `batch_size`: 每个日志级别批量写入的日志条数
    /// - `flush_interval`: 定时刷新日志的时间间隔（毫秒）
    pub fn new(
        log_dir: impl AsRef<Path>,
        file_prefix: &str,
        buffer_size: usize,
        batch_size: usize,
        flush_interval: u64,
    ) -> Arc<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        let (sender, receiver) = mpsc::channel(buffer_size);
        let mut log_files = HashMap::new();
        for level in LEVELS {
            let file_name = format!("{}_{}.json", file_prefix, level.to_lowercase());
            log_files.insert(level.to_string(), Arc::new(rolling::hourly(&log_dir, file_name)));
        }
        tokio::spawn(Self::background_log_writer(log_files, receiver, batch_size, flush_interval));

        // 每小时清理一次超过 72 小时的日志文件
        let cleanup_dir = log_dir.clone();
        tokio::spawn(async move {
            let cleanup_interval = Duration::from_secs(3600);
            loop {
                Self::cleanup_old_logs(&cleanup_dir, 72).await;
                time::sleep(cleanup_interval).await;
            }
        });

        Arc::new(Self { sender, log_dir })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// 记录运行日志，接受两个参数：level 和 message
    pub async fn log(&self, level: &str, message: &str) {
        let content = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "message": message,
        })
        .to_string();
        self.send(LogEntry {
            level: level.to_uppercase(),
            content,
        })
        .await;
    }

    /// 记录一帧渲染结果
    pub async fn frame(&self, frame: &FrameLog) {
        self.send(LogEntry {
            level: FRAME_LEVEL.to_string(),
            content: frame.to_json(),
        })
        .await;
    }

    async fn send(&self, entry: LogEntry) {
        if let Err(e) = self.sender.send(LogMessage::Entry(entry)).await {
            eprintln!("Failed to send runtime log message: {}", e);
        }
    }

    /// 后台日志写入任务
    async fn background_log_writer(
        log_files: HashMap<String, Arc<RollingFileAppender>>,
        mut receiver: Receiver<LogMessage>,
        batch_size: usize,
        flush_interval: u64,
    ) {
        // 每个日志级别独立的缓冲区
        let mut buffers: HashMap<String, Vec<String>> = HashMap::new();
        let mut interval = time::interval(Duration::from_millis(flush_interval));
        loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    Some(LogMessage::Entry(entry)) => {
                        let buffer = buffers.entry(entry.level.clone()).or_default();
                        buffer.push(entry.content);
                        if buffer.len() >= batch_size {
                            Self::flush_level(&log_files, &entry.level, buffer).await;
                        }
                    }
                    Some(LogMessage::Flush(ack)) => {
                        Self::flush_all(&log_files, &mut buffers).await;
                        let _ = ack.send(());
                    }
                    None => {
                        Self::flush_all(&log_files, &mut buffers).await;
                        break;
                    }
                },
                _ = interval.tick() => Self::flush_all(&log_files, &mut buffers).await,
            }
        }
    }

    async fn flush_all(
        log_files: &HashMap<String, Arc<RollingFileAppender>>,
        buffers: &mut HashMap<String, Vec<String>>,
    ) {
        for (level, buffer) in buffers.iter_mut() {
            Self::flush_level(log_files, level, buffer).await;
        }
    }

    async fn flush_level(
        log_files: &HashMap<String, Arc<RollingFileAppender>>,
        level: &str,
        buffer: &mut Vec<String>,
    ) {
        if buffer.is_empty() {
            return;
        }
        // 未知级别归入 INFO
        let appender = log_files.get(level).or_else(|| log_files.get("INFO"));
        if let Some(appender) = appender {
            Self::write_logs_to_disk(Arc::clone(appender), buffer).await;
        }
        buffer.clear();
    }

    async fn write_logs_to_disk(file: Arc<RollingFileAppender>, buffer: &[String]) {
        let content = buffer.join("\n") + "\n";
        let written = task::spawn_blocking(move || {
            let mut writer = file.make_writer();
            writer.write_all(content.as_bytes())
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("Failed to write runtime logs: {}", e),
            Err(e) => eprintln!("Runtime log writer panicked: {}", e),
        }
    }

    async fn cleanup_old_logs(log_dir: &Path, retention_hours: u64) {
        let retention = StdDuration::from_secs(retention_hours * 3600);
        let now = SystemTime::now();
        let mut dir = match tokio::fs::read_dir(log_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Failed to read log directory {}: {}", log_dir.display(), e);
                return;
            }
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
                continue;
            };
            if now.duration_since(modified).unwrap_or_default() > retention {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    eprintln!("Failed to delete old log file {:?}: {}", path, e);
                }
            }
        }
    }

    /// 把缓冲区中的日志全部写盘后返回
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(LogMessage::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }
}
