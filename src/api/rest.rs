use crate::api::error::{ApiError, ApiResult};
use crate::api::types::InboundAuth;
use crate::relay::{RelayEngine, RelayStats, SubmitOutcome};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
struct ApiState {
    engine: Arc<RelayEngine>,
    auth: Arc<InboundAuth>,
}

pub struct RestApi {
    state: ApiState,
}

impl RestApi {
    pub fn new(engine: Arc<RelayEngine>, auth: InboundAuth) -> Self {
        Self {
            state: ApiState {
                engine,
                auth: Arc::new(auth),
            },
        }
    }

    /// Fixed routes plus a fallback that accepts events on any other path.
    ///
    /// Event bodies are taken whole, whatever their size; only the
    /// credential check may turn a submission away.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ping", get(ping))
            .route("/ping/", get(ping))
            .route("/health", get(health_check))
            .route("/stats", get(get_stats))
            .fallback(accept_or_ack)
            .layer(DefaultBodyLimit::disable())
            .with_state(self.state.clone())
    }
}

async fn ping() -> &'static str {
    ">>> PONG!\n"
}

async fn health_check() -> &'static str {
    "OK"
}

async fn get_stats(State(state): State<ApiState>) -> Json<RelayStats> {
    Json(state.engine.stats())
}

async fn accept_or_ack(
    State(state): State<ApiState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    match method {
        Method::POST => submit_event(&state, &headers, &body).await,
        Method::GET | Method::HEAD => Ok(StatusCode::OK),
        other => Err(ApiError::MethodNotAllowed(other.to_string())),
    }
}

async fn submit_event(state: &ApiState, headers: &HeaderMap, body: &Bytes) -> ApiResult<StatusCode> {
    if !state.auth.is_authorized(headers) {
        warn!(header = %state.auth.header(), "Rejected submission without valid credential");
        return Err(ApiError::Forbidden);
    }

    // Non-UTF-8 header values cannot be forwarded as strings and are dropped
    let raw_headers = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)));

    match state.engine.submit(raw_headers, body).await {
        SubmitOutcome::Delivered => debug!("Event delivered immediately"),
        SubmitOutcome::Queued { queue_len, dropped } => {
            debug!(queue_len, dropped, "Event queued for retry")
        }
    }

    Ok(StatusCode::OK)
}
