//! HTTP transport for the hub
//!
//! Thin axum layer over [`HubService`]. Store work is blocking, so every
//! handler runs it on the blocking pool under the configured request
//! timeout.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::CorsLayer;

use crate::ingest::{HubService, IngestError};
use crate::metrics::HubMetrics;
use crate::models::{Alert, AlertSubmission, Severity};

pub const SERVICE_NAME: &str = "bayanihub-hub";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<HubService>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(hub: Arc<HubService>, request_timeout: Duration) -> Self {
        AppState {
            hub,
            request_timeout,
        }
    }
}

/// Errors returned to HTTP clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("malformed payload: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),

    #[error("request timed out")]
    Timeout,
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Validation(msg) => ApiError::BadRequest(msg),
            IngestError::Persistence(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: self.to_string(),
                    message: None,
                },
            ),
            ApiError::Internal(msg) => {
                log::error!("Error processing request: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "internal server error".to_string(),
                        message: Some(msg.clone()),
                    },
                )
            }
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorResponse {
                    error: self.to_string(),
                    message: None,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: String,
    pub id: i64,
    pub severity: Severity,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// Build the hub router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/alerts", get(list_alerts).post(submit_alert))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run blocking hub work off the async runtime, bounded by the request timeout
async fn run_blocking<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&HubService) -> T + Send + 'static,
    T: Send + 'static,
{
    let hub = Arc::clone(&state.hub);
    let task = tokio::task::spawn_blocking(move || work(&hub));

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ApiError::Internal(format!("worker task failed: {}", e))),
        Err(_) => Err(ApiError::Timeout),
    }
}

async fn submit_alert(
    State(state): State<AppState>,
    payload: Result<Json<AlertSubmission>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(submission) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let receipt = run_blocking(&state, move |hub| hub.submit(&submission)).await??;

    Ok(Json(SubmitResponse {
        status: "received".to_string(),
        id: receipt.id,
        severity: receipt.severity,
        summary: receipt.summary,
    }))
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let alerts = run_blocking(&state, move |hub| match params.limit {
        Some(limit) => hub.recent_alerts(limit),
        None => hub.list_alerts(),
    })
    .await?;
    Ok(Json(alerts))
}

async fn metrics(State(state): State<AppState>) -> Result<Json<HubMetrics>, ApiError> {
    let metrics = run_blocking(&state, |hub| hub.get_metrics()).await?;
    Ok(Json(metrics))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = run_blocking(&state, |hub| hub.is_healthy())
        .await
        .unwrap_or(false);

    let (status, label) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            service: SERVICE_NAME.to_string(),
        }),
    )
}
