// src/ingest/validator.rs

use crate::config::FilterPolicy;
use crate::ingest::outcome::{DropReason, IngestOutcome, MalformedReason};
use crate::openrtb::request::{BidRequest, Device};

/// 第一阶段：快速结构校验，缺少基础数据直接拒绝。
///
/// 通过时返回 device 的引用，后续的过滤阶段依赖它一定存在。
pub fn validate_structure(request: &BidRequest) -> Result<&Device, MalformedReason> {
    if request.id.is_empty() {
        return Err(MalformedReason::MissingId);
    }
    let device = request.device.as_ref().ok_or(MalformedReason::MissingDevice)?;
    if request.site.is_none() && request.app.is_none() {
        return Err(MalformedReason::MissingSiteAndApp);
    }
    Ok(device)
}

/// 第二、三阶段：业务过滤。先看 lmt，再看来源 IP
pub fn apply_policy(device: &Device, policy: &FilterPolicy) -> Result<(), DropReason> {
    if device.limits_ad_tracking() {
        return Err(DropReason::LimitAdTracking);
    }
    if policy.is_excluded_ip(&device.ip) {
        return Err(DropReason::ExcludedIp);
    }
    Ok(())
}

/// 不涉及任何 I/O 的前三个阶段，`Ok(())` 表示可以进入序列化
pub fn classify(request: &BidRequest, policy: &FilterPolicy) -> Result<(), IngestOutcome> {
    let device = validate_structure(request).map_err(IngestOutcome::RejectedMalformed)?;
    apply_policy(device, policy).map_err(IngestOutcome::Dropped)
}
