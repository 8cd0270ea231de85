// src/error.rs

use thiserror::Error;

/// `BrokerProducer::submit` 的失败结果
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// 发送缓冲区已满，调用方应快速失败（503，可重试）
    #[error("producer buffer is full")]
    BufferFull,

    /// 刷写任务已停止，broker 连接不可用
    #[error("producer is unavailable")]
    Unavailable,
}

impl SubmitError {
    /// 日志用的拒绝类型名
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitError::BufferFull => "buffer_full",
            SubmitError::Unavailable => "unavailable",
        }
    }
}

/// 启动阶段的致命错误，直接终止进程启动
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to create kafka producer: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("invalid producer config: {0}")]
    Config(String),
}

/// 单条消息在刷写阶段投递失败的原因
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("broker rejected message: {0}")]
    Rejected(String),

    #[error("delivery cancelled before acknowledgment")]
    Canceled,

    #[error("transport error: {0}")]
    Transport(String),
}

impl SinkError {
    /// 写入死信日志的错误类型名
    pub fn kind(&self) -> &'static str {
        match self {
            SinkError::Rejected(_) => "rejected",
            SinkError::Canceled => "canceled",
            SinkError::Transport(_) => "transport",
        }
    }
}
