// src/ingest/engine.rs

use serde::Serialize;
use tracing::{debug, error};

use crate::config::FilterPolicy;
use crate::error::SubmitError;
use crate::ingest::outcome::IngestOutcome;
use crate::ingest::validator::classify;
use crate::openrtb::request::BidRequest;

/// 接收序列化后负载的一方，生产环境是 `BrokerProducer`
pub trait PayloadSubmitter {
    /// 只做缓冲区准入，不能阻塞
    fn submit(&self, payload: Vec<u8>) -> Result<(), SubmitError>;
}

/// 第四阶段：编码成写入 broker 的 JSON 负载
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, IngestOutcome> {
    serde_json::to_vec(value).map_err(|e| IngestOutcome::RejectedSerialization(e.to_string()))
}

/// **处理一个入站竞价请求**
///
/// 依次执行结构校验、lmt 过滤、IP 过滤、序列化、提交到 broker，
/// 任何一个阶段都可能提前给出最终分类。只有最后一步会触碰共享状态。
pub fn process_bid_request<P: PayloadSubmitter + ?Sized>(
    bid_request: &BidRequest,
    policy: &FilterPolicy,
    submitter: &P,
) -> IngestOutcome {
    if let Err(outcome) = classify(bid_request, policy) {
        debug!(
            request_id = %bid_request.id,
            outcome = outcome.kind(),
            reason = outcome.reason().unwrap_or_default(),
            "Bid request filtered"
        );
        return outcome;
    }

    let payload = match encode_payload(bid_request) {
        Ok(payload) => payload,
        Err(outcome) => {
            error!(request_id = %bid_request.id, ?outcome, "Failed to serialize bid request");
            return outcome;
        }
    };

    match submitter.submit(payload) {
        Ok(()) => IngestOutcome::Accepted,
        Err(e) => {
            // 拒绝数量见 ProducerStats::rejected
            debug!(request_id = %bid_request.id, kind = e.kind(), "Producer refused payload");
            IngestOutcome::RejectedBrokerUnavailable(e)
        }
    }
}
