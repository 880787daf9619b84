use crate::adapters::outbound::BroadcastHub;
use crate::application::OptimizationService;
use crate::common::{ApplicationError, DomainError};
use crate::domains::path_optimization::{EnvironmentParams, RunParameters, StopOutcome};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OptimizationService>,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(service: Arc<OptimizationService>, hub: Arc<BroadcastHub>) -> Self {
        Self { service, hub }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/configure-environment", post(configure_environment))
        .route("/api/init-environment", post(configure_environment))
        .route("/api/run-optimization", post(run_optimization))
        .route("/api/run-pso", post(run_optimization))
        .route("/api/stop-optimization", post(stop_optimization))
        .route("/api/status", get(status))
        .route("/ws", get(super::ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body shared by every endpoint: `{status: "error", message}`.
impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApplicationError::Domain(DomainError::Validation { .. })
            | ApplicationError::Domain(DomainError::Serialization(_)) => StatusCode::BAD_REQUEST,
            ApplicationError::Domain(DomainError::NoEnvironment) => StatusCode::CONFLICT,
            ApplicationError::JobStillTerminating { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = json!({ "status": "error", "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// An empty body means "all defaults".
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApplicationError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &body[..]
    };
    serde_json::from_slice(raw)
        .map_err(|e| ApplicationError::Domain(DomainError::validation(e.to_string())))
}

async fn configure_environment(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApplicationError> {
    let params: EnvironmentParams = parse_body(&body)?;
    state.service.configure_environment(params)?;
    Ok(Json(json!({ "status": "success" })))
}

async fn run_optimization(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApplicationError> {
    let params: RunParameters = parse_body(&body)?;
    let job_id = state.service.run_optimization(params).await?;
    Ok(Json(json!({ "status": "optimization_started", "jobId": job_id })))
}

async fn stop_optimization(State(state): State<AppState>) -> Json<serde_json::Value> {
    let message = match state.service.stop_optimization().await {
        StopOutcome::Idle => "No optimization running".to_string(),
        StopOutcome::Stopped(_) => "Optimization stopped".to_string(),
        StopOutcome::Orphaned(job_id) => {
            format!("Stop requested; job {} is still terminating", job_id)
        }
    };
    Json(json!({ "status": "success", "message": message }))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.service.status().await;
    Json(json!({
        "job": status,
        "environmentConfigured": state.service.environment().is_some(),
        "subscribers": state.hub.subscriber_count(),
    }))
}
