// src/broker/sink.rs

use async_trait::async_trait;

use crate::error::SinkError;

/// 批量写入的目标（Kafka 或测试替身）
#[async_trait]
pub trait BatchSink: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// 写出一个批次，返回投递失败的消息；空 Vec 表示全部成功
    async fn write_batch(&self, batch: Vec<Vec<u8>>) -> Vec<DeliveryFailure>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub payload: Vec<u8>,
    pub error: SinkError,
}
