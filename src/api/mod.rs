//! REST API server module
//!
//! Exposes job submission, control and monitoring over HTTP. Every route lives
//! under `/api/v1`.

use crate::{Config, DebridDownloader, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Jobs
/// - `GET /api/v1/jobs[?state=]` - List jobs, optionally filtered by state
/// - `GET /api/v1/jobs/:id` - Get a single job
/// - `POST /api/v1/jobs/url` - Add a hoster link (JSON body)
/// - `POST /api/v1/jobs/container` - Add a torrent file (multipart `file`, optional `options`)
/// - `POST /api/v1/jobs/pause` - Pause jobs
/// - `POST /api/v1/jobs/resume` - Resume jobs
/// - `POST /api/v1/jobs/delete` - Delete jobs, optionally with their files
///
/// ## System
/// - `GET /api/v1/queue/stats` - Queue statistics
/// - `GET /api/v1/providers/test` - Test every configured provider
/// - `GET /api/v1/health` - Health check
/// - `GET /api/v1/events` - Server-sent events stream
pub fn create_router(downloader: Arc<DebridDownloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let api = Router::new()
        .route("/jobs", get(routes::list_jobs))
        .route("/jobs/:id", get(routes::get_job))
        .route("/jobs/url", post(routes::add_url))
        .route("/jobs/container", post(routes::add_container))
        .route("/jobs/pause", post(routes::pause_jobs))
        .route("/jobs/resume", post(routes::resume_jobs))
        .route("/jobs/delete", post(routes::delete_jobs))
        .route("/queue/stats", get(routes::queue_stats))
        .route("/providers/test", get(routes::test_providers))
        .route("/health", get(routes::health_check))
        .route("/events", get(routes::event_stream))
        .with_state(state);

    let router = Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// CORS layer for the configured origins (`"*"` or an empty list allows any)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the API on `config.api.bind_address` until the server stops
///
/// # Example
///
/// ```no_run
/// use debrid_dl::{Config, DebridDownloader};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(DebridDownloader::new((*config).clone()).await?);
///
/// debrid_dl::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(downloader: Arc<DebridDownloader>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
