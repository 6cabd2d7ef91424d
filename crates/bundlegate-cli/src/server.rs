//! HTTP transport over the coordinator.
//!
//! | Route              | Purpose                                              |
//! |--------------------|------------------------------------------------------|
//! | `POST /`           | Request a bundle; the body is a JSON bundle request  |
//! | `GET /`            | Liveness check with registry counters                |
//! | `POST /invalidate` | Reload the configuration of every bundle for a path  |
//!
//! Every failure is answered with `500` and the error message as plain text;
//! clients tell causes apart by message only.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bundlegate_core::{BundleError, BundleRequest, Coordinator};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

/// Name reported by `GET /`, so clients can tell they reached a build server.
pub const SERVICE_NAME: &str = "bundlegate";

#[derive(Clone)]
struct AppState {
    coordinator: Coordinator,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: String,
    pub version: String,
    pub bundles: usize,
    pub watched_config_files: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub path_to_config: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub invalidated: usize,
}

/// Build the axum router.
pub fn router(coordinator: Coordinator) -> Router {
    Router::new()
        .route("/", get(handle_status).post(handle_bundle))
        .route("/invalidate", post(handle_invalidate))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { coordinator })
}

async fn handle_bundle(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match parse_body::<BundleRequest>(&body) {
        Ok(request) => request,
        Err(message) => return failure(message),
    };

    match state.coordinator.request(request).await {
        Ok(payload) => (
            [(header::CONTENT_TYPE, "application/json")],
            String::from(&*payload),
        )
            .into_response(),
        Err(err) => failure(err.to_string()),
    }
}

async fn handle_status(State(state): State<AppState>) -> Response {
    match state.coordinator.status().await {
        Ok(status) => Json(ServiceStatus {
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            bundles: status.bundles,
            watched_config_files: status.watched_config_files,
        })
        .into_response(),
        Err(err) => failure(err.to_string()),
    }
}

async fn handle_invalidate(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match parse_body::<InvalidateRequest>(&body) {
        Ok(request) => request,
        Err(message) => return failure(message),
    };
    let Some(path) = request.path_to_config.filter(|p| !p.trim().is_empty()) else {
        return failure(
            BundleError::RequestValidation {
                field: "path_to_config",
            }
            .to_string(),
        );
    };

    match state.coordinator.reload_config(path).await {
        Ok(invalidated) => Json(InvalidateResponse { invalidated }).into_response(),
        Err(err) => failure(err.to_string()),
    }
}

/// An empty body is an empty request, so missing fields are reported as
/// such rather than as a parse error.
fn parse_body<T>(body: &[u8]) -> Result<T, String>
where
    T: serde::de::DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| format!("invalid request body: {}", e))
}

fn failure(message: String) -> Response {
    tracing::debug!("request failed: {}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message,
    )
        .into_response()
}
