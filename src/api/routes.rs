use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::api::handlers::{handle_bid_request, handle_health};
use crate::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/bid-request", post(handle_bid_request))
        .route("/health", get(handle_health))
        .with_state(state)
}
