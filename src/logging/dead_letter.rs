// src/logging/dead_letter.rs

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Duration};
use tracing::{error, warn};
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::MakeWriter;

use crate::error::SinkError;

/// **死信记录**
///
/// 消息已经进入发送缓冲区、但在刷写阶段投递失败时写入，仅用于运维排查，
/// 不会回传给原始的 HTTP 调用方。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FailedBidRecord {
    pub timestamp: String,
    pub topic: String,
    pub error_type: String,
    pub error_message: String,
    pub failed_operation: String,
    /// 原始负载；能解析成 JSON 时按对象保存，否则按字符串保存
    pub payload: Value,
}

impl FailedBidRecord {
    pub fn new(topic: &str, operation: &str, error: &SinkError, payload: &[u8]) -> Self {
        let payload = serde_json::from_slice(payload)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()));
        Self {
            timestamp: Utc::now().to_rfc3339(),
            topic: topic.to_string(),
            error_type: error.kind().to_string(),
            error_message: error.to_string(),
            failed_operation: operation.to_string(),
            payload,
        }
    }
}

/// 死信日志写入器句柄，可以随意 clone。
///
/// 记录先进入有界通道，由后台任务按条数或时间间隔批量写入按小时滚动的文件。
/// 所有句柄 drop 之后后台任务会把剩余记录刷盘并退出。
#[derive(Clone)]
pub struct DeadLetterLog {
    sender: Sender<String>,
}

impl DeadLetterLog {
    /// - `log_dir`: 日志目录，文件名形如 `dead_letter.json.2026-10-18-09`
    /// - `buffer_size`: 通道容量
    /// - `batch_size`: 攒够多少条写一次盘
    /// - `flush_interval`: 定时刷盘间隔（毫秒）
    pub fn start(
        log_dir: &str,
        buffer_size: usize,
        batch_size: usize,
        flush_interval: u64,
    ) -> (Self, JoinHandle<()>) {
        let appender = rolling::hourly(log_dir, "dead_letter.json");
        Self::with_appender(appender, buffer_size, batch_size, flush_interval)
    }

    pub fn with_appender(
        appender: RollingFileAppender,
        buffer_size: usize,
        batch_size: usize,
        flush_interval: u64,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let log_file = Arc::new(appender);
        let writer = tokio::spawn(Self::background_log_writer(
            log_file,
            receiver,
            batch_size.max(1),
            flush_interval,
        ));
        (Self { sender }, writer)
    }

    /// 记录一条死信，不等待；通道满时只打告警
    pub fn record(&self, record: &FailedBidRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, topic = %record.topic, "Failed to encode dead letter record");
                return;
            }
        };

        match self.sender.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(topic = %record.topic, "Dead letter buffer full, record discarded");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(topic = %record.topic, "Dead letter log closed, record discarded");
            }
        }
    }

    async fn background_log_writer(
        log_file: Arc<RollingFileAppender>,
        mut receiver: Receiver<String>,
        batch_size: usize,
        flush_interval: u64,
    ) {
        let mut buffer = Vec::with_capacity(batch_size);
        let mut interval = time::interval(Duration::from_millis(flush_interval.max(1)));

        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Some(line) => {
                        buffer.push(line);
                        if buffer.len() >= batch_size {
                            Self::write_logs_to_disk(log_file.clone(), &mut buffer).await;
                        }
                    }
                    None => break,
                },
                _ = interval.tick() => {
                    if !buffer.is_empty() {
                        Self::write_logs_to_disk(log_file.clone(), &mut buffer).await;
                    }
                }
            }
        }

        if !buffer.is_empty() {
            Self::write_logs_to_disk(log_file, &mut buffer).await;
        }
    }

    async fn write_logs_to_disk(file: Arc<RollingFileAppender>, buffer: &mut Vec<String>) {
        let content = buffer.join("\n") + "\n";
        buffer.clear();

        let written = task::spawn_blocking(move || {
            let mut writer = file.make_writer();
            writer.write_all(content.as_bytes())
        })
        .await;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Failed to write dead letter records"),
            Err(e) => error!(error = %e, "Dead letter writer task failed"),
        }
    }
}
