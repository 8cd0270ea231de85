// src/broker/kafka.rs

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::info;

use crate::broker::producer::ProducerConfig;
use crate::broker::sink::{BatchSink, DeliveryFailure};
use crate::error::{InitError, SinkError};

/// 基于 rdkafka `FutureProducer` 的批次写入端。
///
/// 批次在上游 `BrokerProducer` 中已经按字节数/时间聚合，这里 `linger.ms=0`，
/// 把一个批次的消息一次性交给 librdkafka 并发送。
pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaSink {
    pub fn new(config: &ProducerConfig) -> Result<Self, InitError> {
        if config.topic.is_empty() {
            return Err(InitError::Config("topic must not be empty".to_string()));
        }
        if config.bootstrap_servers.is_empty() {
            return Err(InitError::Config("bootstrap servers must not be empty".to_string()));
        }

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            topic = %config.topic,
            "Initializing Kafka producer"
        );

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("acks", config.acks.as_kafka_value())
            .set("message.timeout.ms", config.message_timeout.as_millis().to_string())
            .set("linger.ms", "0")
            .set("batch.size", config.max_batch_bytes.max(1).to_string())
            .set("queue.buffering.max.messages", "1000000")
            .create()?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl BatchSink for KafkaSink {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn write_batch(&self, batch: Vec<Vec<u8>>) -> Vec<DeliveryFailure> {
        // 本地队列满时不重试，直接算作投递失败
        let deliveries = batch.iter().map(|payload| {
            let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(payload.as_slice());
            self.producer.send(record, Timeout::After(Duration::ZERO))
        });
        let results = join_all(deliveries).await;

        batch
            .into_iter()
            .zip(results)
            .filter_map(|(payload, result)| match result {
                Ok(_) => None,
                Err((error, _)) => Some(DeliveryFailure {
                    payload,
                    error: sink_error(error),
                }),
            })
            .collect()
    }
}

fn sink_error(error: KafkaError) -> SinkError {
    match error {
        KafkaError::Canceled => SinkError::Canceled,
        KafkaError::MessageProduction(code) => SinkError::Rejected(code.to_string()),
        other => SinkError::Transport(other.to_string()),
    }
}
