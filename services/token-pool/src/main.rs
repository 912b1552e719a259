//! Apify Token Pool
//!
//! Single-binary service that:
//! 1. Loads the configured Apify tokens (fails fast if there are none)
//! 2. Probes every token's monthly budget and selects the best one
//! 3. Serves pool health, Prometheus metrics and the admin API
//!
//! The pool is constructed here and owned for the life of the process; the
//! forwarding layer receives it as an `Arc<Pool>` and calls `get_current()`.

mod admin;
mod config;
mod metrics;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use budget_probe::ApifyProbe;
use credit_pool::Pool;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::admin::{AdminState, build_admin_router};
use crate::config::Config;

/// Upper bound on graceful drain after a shutdown signal. In-flight probe
/// batches (e.g. a forced refresh) are abandoned once it expires.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    pool: Arc<Pool>,
    prometheus: PrometheusHandle,
    started_at: Instant,
}

/// Build the axum router with health, metrics and admin routes.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let admin = build_admin_router(AdminState::new(state.pool.clone()));
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(admin)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting apify-token-pool");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using defaults"),
    }

    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;
    let tokens = config
        .tokens
        .as_ref()
        .context("configuration resolved without tokens")?;
    let credentials =
        credit_pool::parse_credentials(tokens.expose()).context("invalid Apify token list")?;

    info!(
        listen_addr = %config.server.listen_addr,
        api_base = %config.apify.api_base,
        credentials = credentials.len(),
        "configuration loaded"
    );

    let probe = Arc::new(ApifyProbe::new(
        reqwest::Client::new(),
        config.apify.api_base.clone(),
    ));
    let pool = Arc::new(
        Pool::new(credentials, probe, config.pool_settings()).context("failed to build pool")?,
    );

    // Warm the cache so the first caller does not pay for the probe batch.
    // Running out of budget is not a startup failure; callers see the error.
    tokio::select! {
        result = pool.get_current() => match result {
            Ok(credential) => info!(
                credential_id = %credential.fingerprint(),
                preview = %credential.preview(),
                "initial credential selected"
            ),
            Err(e) => warn!(error = %e, "no usable credential at startup"),
        },
        _ = shutdown_signal() => {
            info!("shutdown requested during warm-up, abandoning probes");
            return Ok(());
        }
    }

    let app_state = AppState {
        pool,
        prometheus: prometheus_handle,
        started_at: Instant::now(),
    };
    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires: notify the
    // server to drain, then race the drain against the timeout.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, abandoning in-flight requests"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: pool health plus uptime.
/// Returns 503 when no credential is valid, 200 otherwise (including before
/// the first refresh).
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = state.pool.health().await;
    body["uptime_seconds"] = serde_json::json!(state.started_at.elapsed().as_secs());

    let status_code = if body["status"] == "unhealthy" {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    } else {
        axum::http::StatusCode::OK
    };

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint: returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StaticProbe, test_pool};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    /// PrometheusHandle for tests without installing a global recorder.
    fn test_prometheus_handle() -> PrometheusHandle {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        recorder.handle()
    }

    fn test_app(probe: StaticProbe, tokens: &[&str]) -> Router {
        let (pool, _) = test_pool(probe, tokens);
        build_router(
            AppState {
                pool,
                prometheus: test_prometheus_handle(),
                started_at: Instant::now(),
            },
            16,
        )
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_before_refresh_is_pending_and_ok() {
        let app = test_app(StaticProbe::new().budget("tok_a", 5.0, 1.0), &["tok_a"]);

        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert!(body["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn health_after_warm_up_is_healthy() {
        let (pool, _) = test_pool(StaticProbe::new().budget("tok_a", 5.0, 1.0), &["tok_a"]);
        pool.get_current().await.unwrap();
        let app = build_router(
            AppState {
                pool,
                prometheus: test_prometheus_handle(),
                started_at: Instant::now(),
            },
            16,
        );

        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["credentials_valid"], 1);
    }

    #[tokio::test]
    async fn health_without_valid_credentials_is_503() {
        let (pool, _) = test_pool(StaticProbe::new().status("tok_a", 500), &["tok_a"]);
        pool.refresh_all().await;
        let app = build_router(
            AppState {
                pool,
                prometheus: test_prometheus_handle(),
                started_at: Instant::now(),
            },
            16,
        );

        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_prometheus_text() {
        let app = test_app(StaticProbe::new(), &["tok_a"]);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[axum::http::header::CONTENT_TYPE]
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn admin_routes_are_mounted() {
        let app = test_app(StaticProbe::new().budget("tok_a", 5.0, 1.0), &["tok_a"]);

        let (status, body) = get_json(app, "/admin/pool/current").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], credit_pool::Credential::new("tok_a").fingerprint());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = test_app(StaticProbe::new(), &["tok_a"]);

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
