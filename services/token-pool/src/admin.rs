//! Admin API for the credential pool
//!
//! Endpoints:
//! - `GET /admin/pool`: pool status summary (same shape as /health)
//! - `GET /admin/pool/current`: credential the next unit of work would use
//! - `POST /admin/pool/refresh`: probe every credential now
//!
//! Responses identify credentials by fingerprint and preview only; tokens are
//! never returned.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use credit_pool::Pool;
use tracing::{info, warn};

/// Shared state for admin API handlers.
#[derive(Clone)]
pub struct AdminState {
    pool: Arc<Pool>,
}

impl AdminState {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }
}

/// Build the admin router.
pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/pool", get(pool_status))
        .route("/admin/pool/current", get(current_credential))
        .route("/admin/pool/refresh", post(refresh_pool))
        .with_state(state)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> impl IntoResponse {
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// GET /admin/pool: cached statuses and overall pool health.
async fn pool_status(State(state): State<AdminState>) -> impl IntoResponse {
    json_response(StatusCode::OK, state.pool.health().await)
}

/// GET /admin/pool/current: run the cached selection policy.
///
/// May trigger a probe batch if the cache is stale. Returns 503 when no
/// credential is valid.
async fn current_credential(State(state): State<AdminState>) -> impl IntoResponse {
    match state.pool.get_current().await {
        Ok(credential) => json_response(
            StatusCode::OK,
            serde_json::json!({
                "id": credential.fingerprint(),
                "preview": credential.preview(),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "admin current-credential lookup failed");
            json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "error": {
                        "type": "no_credential_available",
                        "message": e.to_string(),
                    }
                }),
            )
        }
    }
}

/// POST /admin/pool/refresh: forced probe batch.
async fn refresh_pool(State(state): State<AdminState>) -> impl IntoResponse {
    info!("forced refresh requested via admin API");
    let statuses = state.pool.refresh_all().await;
    let valid = statuses.iter().filter(|s| s.valid()).count();
    let credentials: Vec<serde_json::Value> = statuses.iter().map(|s| s.to_json()).collect();

    json_response(
        StatusCode::OK,
        serde_json::json!({
            "total": statuses.len(),
            "valid": valid,
            "invalid": statuses.len() - valid,
            "credentials": credentials,
        }),
    )
}
