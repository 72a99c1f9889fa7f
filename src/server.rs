use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    config::{HTTP_CONCURRENCY, HTTP_DEFAULT_PORT_SPEC, HTTP_DEFAULT_TARGET, HTTP_TIMEOUT},
    ports,
    scanner::Scanner,
    types::ProbeResult,
};

/// Fixed scan parameters applied to every HTTP request.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub concurrency: usize,
    pub timeout: Duration,
    /// Directory served for everything outside the API routes.
    pub ui_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            concurrency: HTTP_CONCURRENCY,
            timeout: HTTP_TIMEOUT,
            ui_dir: PathBuf::from("ui"),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    settings: Arc<ServerSettings>,
}

/// Form fields posted to `/scan`. Missing or blank fields fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ScanForm {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub ports: Option<String>,
}

/// Body of a successful `/scan`: the echoed target and its open ports, ascending.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResponse {
    pub target: String,
    pub results: Vec<ProbeResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Build the application router.
pub fn router(settings: ServerSettings) -> Router {
    let static_svc = ServeDir::new(&settings.ui_dir).append_index_html_on_directories(true);
    let state = AppState {
        settings: Arc::new(settings),
    };

    Router::new()
        .route("/scan", post(post_scan))
        .route("/health", get(health))
        .with_state(state)
        .fallback_service(static_svc)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Bind `bind` and serve until Ctrl-C.
pub async fn serve(bind: &str, settings: ServerSettings) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, "serving HTTP");
    axum::serve(listener, router(settings))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn post_scan(State(app): State<AppState>, Form(form): Form<ScanForm>) -> Response {
    let target = non_blank(form.target).unwrap_or_else(|| HTTP_DEFAULT_TARGET.to_string());
    let spec = non_blank(form.ports).unwrap_or_else(|| HTTP_DEFAULT_PORT_SPEC.to_string());

    let ports = match ports::parse_ports(&spec) {
        Ok(p) => p,
        Err(e) => {
            warn!(scan_target = %target, error = %e, "rejecting scan request");
            let body = ErrorBody {
                error: e.to_string(),
            };
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let settings = &app.settings;
    // One scanner per request, so concurrent requests never share a concurrency budget.
    let scanner =
        Scanner::new(target.as_str(), &ports, settings.concurrency, settings.timeout).await;
    let mut results: Vec<ProbeResult> = scanner
        .scan()
        .await
        .into_iter()
        .filter(|r| r.open)
        .collect();
    results.sort_by_key(|r| r.port);

    (StatusCode::OK, Json(ScanResponse { target, results })).into_response()
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
