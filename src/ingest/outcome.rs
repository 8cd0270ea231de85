// src/ingest/outcome.rs

use axum::http::StatusCode;

use crate::error::SubmitError;

/// 结构校验失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// 请求体不是合法的 BidRequest JSON
    InvalidJson,
    MissingId,
    MissingDevice,
    MissingSiteAndApp,
}

impl MalformedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MalformedReason::InvalidJson => "invalid_json",
            MalformedReason::MissingId => "missing_id",
            MalformedReason::MissingDevice => "missing_device",
            MalformedReason::MissingSiteAndApp => "missing_site_and_app",
        }
    }
}

/// 业务过滤命中的规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    LimitAdTracking,
    ExcludedIp,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::LimitAdTracking => "limit_ad_tracking",
            DropReason::ExcludedIp => "excluded_ip",
        }
    }
}

/// **单个请求的最终分类**
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// 已进入 broker 发送缓冲区
    Accepted,
    RejectedMalformed(MalformedReason),
    /// 合法但被策略过滤，对上游来说不是错误
    Dropped(DropReason),
    RejectedSerialization(String),
    /// 缓冲区满或 broker 不可用，上游可以自行退避重试
    RejectedBrokerUnavailable(SubmitError),
}

impl IngestOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestOutcome::Accepted => StatusCode::OK,
            IngestOutcome::RejectedMalformed(_) => StatusCode::BAD_REQUEST,
            IngestOutcome::Dropped(_) => StatusCode::NO_CONTENT,
            IngestOutcome::RejectedSerialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            IngestOutcome::RejectedBrokerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// 响应体中的 `status` 字段；`Dropped` 返回空响应体，没有 label
    pub fn status_label(&self) -> Option<&'static str> {
        match self {
            IngestOutcome::Accepted => Some("accepted"),
            IngestOutcome::RejectedMalformed(_) => Some("bad request"),
            IngestOutcome::Dropped(_) => None,
            IngestOutcome::RejectedSerialization(_) => Some("serialization error"),
            IngestOutcome::RejectedBrokerUnavailable(_) => Some("broker unavailable"),
        }
    }

    /// 日志用的拒绝/丢弃原因
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            IngestOutcome::RejectedMalformed(reason) => Some(reason.as_str()),
            IngestOutcome::Dropped(reason) => Some(reason.as_str()),
            _ => None,
        }
    }

    /// 日志用的简短分类名
    pub fn kind(&self) -> &'static str {
        match self {
            IngestOutcome::Accepted => "accepted",
            IngestOutcome::RejectedMalformed(_) => "rejected_malformed",
            IngestOutcome::Dropped(_) => "dropped",
            IngestOutcome::RejectedSerialization(_) => "rejected_serialization",
            IngestOutcome::RejectedBrokerUnavailable(_) => "rejected_broker_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (IngestOutcome::Accepted, StatusCode::OK, Some("accepted")),
            (
                IngestOutcome::RejectedMalformed(MalformedReason::MissingId),
                StatusCode::BAD_REQUEST,
                Some("bad request"),
            ),
            (IngestOutcome::Dropped(DropReason::ExcludedIp), StatusCode::NO_CONTENT, None),
            (
                IngestOutcome::RejectedSerialization("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
                Some("serialization error"),
            ),
            (
                IngestOutcome::RejectedBrokerUnavailable(SubmitError::BufferFull),
                StatusCode::SERVICE_UNAVAILABLE,
                Some("broker unavailable"),
            ),
        ];

        for (outcome, status, label) in cases {
            assert_eq!(outcome.status_code(), status, "{:?}", outcome);
            assert_eq!(outcome.status_label(), label, "{:?}", outcome);
        }
    }
}
