use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use crate::ingest::outcome::MalformedReason;
use crate::ingest::{process_bid_request, IngestOutcome};
use crate::openrtb::request::BidRequest;
use crate::AppState;

/// **处理 POST /bid-request**
///
/// JSON 解析失败（包括缺少 Content-Type）在进入处理链之前直接按 400 返回。
pub async fn handle_bid_request(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BidRequest>, JsonRejection>,
) -> IngestOutcome {
    let bid_request = match payload {
        Ok(Json(bid_request)) => bid_request,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Invalid json payload");
            return IngestOutcome::RejectedMalformed(MalformedReason::InvalidJson);
        }
    };

    process_bid_request(&bid_request, &state.policy, &state.producer)
}

/// 健康检查，producer 停止后返回 503
pub async fn handle_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let producer = &state.producer;
    let (status, label) = if producer.is_running() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        status,
        Json(json!({
            "status": label,
            "topic": producer.topic(),
            "producer": producer.stats(),
        })),
    )
}

impl IntoResponse for IngestOutcome {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self.status_label() {
            Some(label) => (status, Json(json!({ "status": label }))).into_response(),
            None => status.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use axum::Router;
    use tower::ServiceExt;

    use super::*;
    use crate::api::routes::build_router;
    use crate::broker::producer::{BrokerProducer, ProducerConfig, ProducerTask};
    use crate::broker::sink::testing::{RecordingSink, StalledSink};
    use crate::broker::sink::BatchSink;
    use crate::config::FilterPolicy;

    fn test_app<S: BatchSink>(sink: S, config: ProducerConfig) -> (Router, ProducerTask) {
        let (producer, task) = BrokerProducer::start(&config, sink, None);
        let state = Arc::new(AppState {
            producer,
            policy: Arc::new(FilterPolicy::default()),
        });
        (build_router(state), task)
    }

    fn bid_request(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/bid-request")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn json_body(body: &str) -> Value {
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn valid_bid_request_is_accepted_and_forwarded() {
        let sink = RecordingSink::default();
        let (app, task) = test_app(sink.clone(), ProducerConfig::default());

        let (status, body) = send(
            &app,
            bid_request(r#"{"id":"123","device":{},"app":{"bundle":"com.example.app"}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({"status": "accepted"}));

        task.shutdown().await;
        let payloads = sink.batches().concat();
        assert_eq!(payloads.len(), 1);
        let forwarded: Value = serde_json::from_slice(&payloads[0]).unwrap();
        assert_eq!(forwarded["id"], "123");
        assert_eq!(forwarded["site"], Value::Null);
    }

    #[tokio::test]
    async fn missing_site_and_app_is_bad_request() {
        let (app, task) = test_app(RecordingSink::default(), ProducerConfig::default());

        let (status, body) = send(&app, bid_request(r#"{"id":"123","device":{}}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body), json!({"status": "bad request"}));
        task.shutdown().await;
    }

    #[tokio::test]
    async fn limit_ad_tracking_is_no_content() {
        let sink = RecordingSink::default();
        let (app, task) = test_app(sink.clone(), ProducerConfig::default());

        let (status, body) = send(
            &app,
            bid_request(r#"{"id":"123","app":{"bundle":"x"},"device":{"lmt":1}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        task.shutdown().await;
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (app, task) = test_app(RecordingSink::default(), ProducerConfig::default());

        let (status, body) = send(&app, bid_request(r#"{"id":"123","device":"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body), json!({"status": "bad request"}));

        let (status, _) = send(&app, bid_request(r#"{"id":123,"device":{},"app":{}}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let without_content_type = Request::builder()
            .method(Method::POST)
            .uri("/bid-request")
            .body(Body::from(r#"{"id":"123","device":{},"app":{}}"#))
            .unwrap();
        let (status, _) = send(&app, without_content_type).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        task.shutdown().await;
    }

    #[tokio::test]
    async fn saturated_buffer_is_service_unavailable() {
        let sink = StalledSink::new();
        let config = ProducerConfig {
            buffer_capacity: 1,
            max_batch_bytes: 1,
            linger: Duration::from_millis(5),
            ..ProducerConfig::default()
        };
        let (app, task) = test_app(sink.clone(), config);
        let body = r#"{"id":"123","device":{},"app":{"bundle":"com.example.app"}}"#;

        let (status, _) = send(&app, bid_request(body)).await;
        assert_eq!(status, StatusCode::OK);
        sink.wait_until_stalled().await;

        let (status, _) = send(&app, bid_request(body)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, bid_request(body)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(&body), json!({"status": "broker unavailable"}));

        sink.release();
        task.shutdown().await;
    }

    #[tokio::test]
    async fn health_reflects_producer_state() {
        let (app, task) = test_app(RecordingSink::default(), ProducerConfig::default());
        let health = || Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(&app, health()).await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["topic"], "bids");
        assert_eq!(body["producer"]["submitted"], 0);

        task.shutdown().await;

        let (status, body) = send(&app, health()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(&body)["status"], "unavailable");

        let (status, _) = send(
            &app,
            bid_request(r#"{"id":"123","device":{},"app":{"bundle":"x"}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
