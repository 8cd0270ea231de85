// src/broker/producer.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::broker::sink::BatchSink;
use crate::error::SubmitError;
use crate::ingest::engine::PayloadSubmitter;
use crate::logging::dead_letter::{DeadLetterLog, FailedBidRecord};

/// Kafka `acks` 设置
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum AckMode {
    /// acks=0，发出即视为完成
    None,
    /// acks=1
    Leader,
    /// acks=all
    All,
}

impl AckMode {
    pub fn as_kafka_value(&self) -> &'static str {
        match self {
            AckMode::None => "0",
            AckMode::Leader => "1",
            AckMode::All => "all",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProducerConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    /// 发送缓冲区容量（条）
    pub buffer_capacity: usize,
    /// 批次字节数上限，达到即刷写
    pub max_batch_bytes: usize,
    /// 批次中最早一条消息的最长等待时间
    pub linger: Duration,
    pub acks: AckMode,
    pub message_timeout: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "bids".to_string(),
            buffer_capacity: 5000,
            max_batch_bytes: 128 * 1024,
            linger: Duration::from_millis(10),
            acks: AckMode::None,
            message_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct ProducerStats {
    submitted: AtomicU64,
    rejected: AtomicU64,
    batches: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerStatsSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub batches: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// **Broker 生产者句柄**
///
/// 进程启动时通过 [`BrokerProducer::start`] 创建一次，clone 后注入到每个请求处理路径。
/// `submit` 只做非阻塞的缓冲区准入：写进有界通道即返回成功，缓冲区满立即返回
/// `BufferFull`，不会等待。批量刷写在独立的 tokio 任务中进行。
///
/// 投递语义是 fire-and-forget：默认 `acks=0`，不等待 broker 的持久化确认，
/// 用持久性换取调用方亚毫秒级的延迟。进入缓冲区之后的投递失败只记录日志和死信，
/// 不会影响已经返回给调用方的结果。
///
/// 刷写任务一次只处理一个批次，`write_batch` 要等该批次的投递结果全部返回才会组下一批。
/// `acks=all` 时吞吐上限是每个 broker 往返一个批次；Kafka 不可用时每个批次最多
/// 卡住 `message_timeout`，期间新消息堆积在缓冲区，写满后 `submit` 返回 `BufferFull`。
#[derive(Clone)]
pub struct BrokerProducer {
    sender: Sender<(Instant, Vec<u8>)>,
    stats: Arc<ProducerStats>,
    topic: Arc<str>,
}

/// 后台刷写任务的句柄，drop 它等同于请求关闭
pub struct ProducerTask {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl ProducerTask {
    /// 关闭缓冲区，把已经接收的消息全部刷写完再返回
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.join.await {
            error!(error = %e, "Producer flush task panicked");
        }
    }
}

impl BrokerProducer {
    pub fn start<S: BatchSink>(
        config: &ProducerConfig,
        sink: S,
        dead_letters: Option<DeadLetterLog>,
    ) -> (Self, ProducerTask) {
        let (sender, receiver) = mpsc::channel(config.buffer_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stats = Arc::new(ProducerStats::default());
        let topic: Arc<str> = Arc::from(config.topic.as_str());

        info!(
            topic = %topic,
            sink = sink.name(),
            buffer_capacity = config.buffer_capacity,
            max_batch_bytes = config.max_batch_bytes,
            linger_ms = config.linger.as_millis() as u64,
            acks = config.acks.as_kafka_value(),
            "Initializing broker producer"
        );

        let flusher = BatchFlusher {
            sink,
            receiver,
            stats: stats.clone(),
            dead_letters,
            topic: topic.clone(),
            max_batch_bytes: config.max_batch_bytes.max(1),
            linger: config.linger,
        };
        let join = tokio::spawn(flusher.run(shutdown_rx));

        (
            Self { sender, stats, topic },
            ProducerTask { shutdown: shutdown_tx, join },
        )
    }

    /// 非阻塞提交一条已序列化的消息
    pub fn submit(&self, payload: Vec<u8>) -> Result<(), SubmitError> {
        match self.sender.try_send((Instant::now(), payload)) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(SubmitError::BufferFull)
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(SubmitError::Unavailable)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn stats(&self) -> ProducerStatsSnapshot {
        ProducerStatsSnapshot {
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            batches: self.stats.batches.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

impl PayloadSubmitter for BrokerProducer {
    fn submit(&self, payload: Vec<u8>) -> Result<(), SubmitError> {
        BrokerProducer::submit(self, payload)
    }
}

#[derive(Default)]
struct PendingBatch {
    payloads: Vec<Vec<u8>>,
    bytes: usize,
    deadline: Option<Instant>,
}

impl PendingBatch {
    fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// 截止时间从批次中第一条消息的提交时刻算起，而不是从被刷写任务取出时算起
    fn push(&mut self, enqueued_at: Instant, payload: Vec<u8>, linger: Duration) {
        if self.payloads.is_empty() {
            self.deadline = Some(enqueued_at + linger);
        }
        self.bytes += payload.len();
        self.payloads.push(payload);
    }

    fn take(&mut self) -> (Vec<Vec<u8>>, usize) {
        let bytes = std::mem::take(&mut self.bytes);
        self.deadline = None;
        (std::mem::take(&mut self.payloads), bytes)
    }
}

struct BatchFlusher<S> {
    sink: S,
    receiver: Receiver<(Instant, Vec<u8>)>,
    stats: Arc<ProducerStats>,
    dead_letters: Option<DeadLetterLog>,
    topic: Arc<str>,
    max_batch_bytes: usize,
    linger: Duration,
}

impl<S: BatchSink> BatchFlusher<S> {
    /// 按字节数或等待时间（先到者为准）刷写批次
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let mut batch = PendingBatch::default();

        loop {
            let deadline = batch.deadline;
            tokio::select! {
                received = self.receiver.recv() => match received {
                    Some((enqueued_at, payload)) => self.admit(&mut batch, enqueued_at, payload).await,
                    None => break,
                },
                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush(&mut batch, "linger").await;
                }
                _ = &mut shutdown => {
                    self.receiver.close();
                    while let Some((enqueued_at, payload)) = self.receiver.recv().await {
                        self.admit(&mut batch, enqueued_at, payload).await;
                    }
                    break;
                }
            }
        }

        self.flush(&mut batch, "shutdown").await;
        info!(topic = %self.topic, "Broker producer stopped");
    }

    async fn admit(&self, batch: &mut PendingBatch, enqueued_at: Instant, payload: Vec<u8>) {
        if !batch.is_empty() && batch.bytes + payload.len() > self.max_batch_bytes {
            self.flush(batch, "size").await;
        }
        batch.push(enqueued_at, payload, self.linger);
        if batch.bytes >= self.max_batch_bytes {
            self.flush(batch, "size").await;
        }
    }

    async fn flush(&self, batch: &mut PendingBatch, trigger: &'static str) {
        if batch.is_empty() {
            return;
        }
        let (payloads, bytes) = batch.take();
        let count = payloads.len();
        debug!(topic = %self.topic, count, bytes, trigger, "Flushing batch");

        let failures = self.sink.write_batch(payloads).await;

        self.stats.batches.fetch_add(1, Ordering::Relaxed);
        self.stats
            .delivered
            .fetch_add((count - failures.len().min(count)) as u64, Ordering::Relaxed);
        self.stats
            .failed
            .fetch_add(failures.len() as u64, Ordering::Relaxed);

        if failures.is_empty() {
            return;
        }
        warn!(
            topic = %self.topic,
            failed = failures.len(),
            count,
            "Batch delivery partially failed"
        );
        for failure in failures {
            error!(topic = %self.topic, error = %failure.error, "Kafka write error");
            if let Some(dead_letters) = &self.dead_letters {
                dead_letters.record(&FailedBidRecord::new(
                    &self.topic,
                    "flush",
                    &failure.error,
                    &failure.payload,
                ));
            }
        }
    }
}
