// src/api.rs
//! HTTP surface. Two triggers proxy to the orchestrator:
//! * `POST /aggregate`: on-demand run for the owner resolved from the
//!   bearer token (the platform's session layer sits in front of this).
//! * `POST /internal/sync`: full sweep, gated by the scheduler secrets.
//! Both reject before any work when the token is missing or unknown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::aggregate::Aggregator;
use crate::sync;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub scheduler_secrets: Arc<Vec<String>>,
    /// bearer token -> owner id for the on-demand endpoint.
    pub owner_tokens: Arc<HashMap<String, String>>,
    pub run_deadline: Option<Duration>,
}

impl AppState {
    pub fn new(
        aggregator: Arc<Aggregator>,
        scheduler_secrets: Vec<String>,
        owner_tokens: HashMap<String, String>,
        run_deadline: Option<Duration>,
    ) -> Self {
        Self {
            aggregator,
            scheduler_secrets: Arc::new(scheduler_secrets),
            owner_tokens: Arc::new(owner_tokens),
            run_deadline,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/aggregate", post(aggregate))
        .route("/internal/sync", post(trigger_sync))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.into(),
        }),
    )
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// On-demand aggregation for the authenticated owner.
async fn aggregate(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "missing bearer token");
    };
    let Some(owner_id) = state.owner_tokens.get(token).cloned() else {
        return error_response(StatusCode::UNAUTHORIZED, "unknown token");
    };

    let deadline = state.run_deadline.map(|d| Instant::now() + d);
    match state.aggregator.run_for_owner(&owner_id, deadline).await {
        Ok(report) => Json(report).into_response(),
        // Only datastore/config failures land here; per-pair failures are
        // inside the report.
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}

/// Scheduled-run trigger for the hosting platform's cron.
async fn trigger_sync(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let authorized = bearer_token(&headers)
        .map(|token| state.scheduler_secrets.iter().any(|s| s == token))
        .unwrap_or(false);
    if !authorized {
        return error_response(StatusCode::UNAUTHORIZED, "invalid scheduler secret");
    }

    let deadline = state.run_deadline;
    match sync::run_sweep(&state.aggregator, deadline).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}
