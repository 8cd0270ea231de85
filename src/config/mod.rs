// src/config/mod.rs

use std::time::Duration;

use clap::Parser;

use crate::broker::producer::{AckMode, ProducerConfig};

pub mod filter_policy;

pub use filter_policy::FilterPolicy;

pub const DEFAULT_EXCLUDED_IP_PREFIXES: &str = "10.10.";

/// 命令行参数，每一项都可以用环境变量覆盖
#[derive(Parser, Debug, Clone)]
#[command(author = "whiteCcinn", version = "1.0", about = "Real-time bid request ingestion gateway")]
pub struct CliArgs {
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: String,

    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS", default_value = "localhost:9092")]
    pub kafka_bootstrap_servers: String,

    #[arg(long, env = "BID_TOPIC", default_value = "bids")]
    pub topic: String,

    /// 发送缓冲区最多容纳的消息条数，满了直接返回 503
    #[arg(long, env = "PRODUCER_BUFFER_CAPACITY", default_value_t = 5000)]
    pub buffer_capacity: usize,

    #[arg(long, env = "PRODUCER_BATCH_MAX_BYTES", default_value_t = 131_072)]
    pub batch_max_bytes: usize,

    #[arg(long, env = "PRODUCER_BATCH_LINGER_MS", default_value_t = 10)]
    pub batch_linger_ms: u64,

    /// none 即 acks=0，不等待 broker 确认
    #[arg(long, env = "PRODUCER_ACKS", value_enum, default_value_t = AckMode::None)]
    pub acks: AckMode,

    #[arg(long, env = "PRODUCER_MESSAGE_TIMEOUT_MS", default_value_t = 5000)]
    pub message_timeout_ms: u64,

    /// 逗号分隔的 IP 前缀列表
    #[arg(long, env = "EXCLUDED_IP_PREFIXES", default_value = DEFAULT_EXCLUDED_IP_PREFIXES)]
    pub excluded_ip_prefixes: String,
}

impl CliArgs {
    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            bootstrap_servers: self.kafka_bootstrap_servers.clone(),
            topic: self.topic.clone(),
            buffer_capacity: self.buffer_capacity,
            max_batch_bytes: self.batch_max_bytes,
            linger: Duration::from_millis(self.batch_linger_ms),
            acks: self.acks,
            message_timeout: Duration::from_millis(self.message_timeout_ms),
        }
    }

    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy::from_args(&self.excluded_ip_prefixes)
    }
}
