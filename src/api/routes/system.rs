//! System handlers: queue statistics, provider tests, health, events.

use crate::api::AppState;
use crate::error::Error;
use crate::providers::ProviderTestResult;
use crate::types::{Event, QueueStats};
use axum::{
    Json,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// GET /queue/stats - Queue statistics
pub async fn queue_stats(State(state): State<AppState>) -> Result<Json<QueueStats>, Error> {
    Ok(Json(state.downloader.queue_stats().await?))
}

/// GET /providers/test - Test connectivity of every configured provider
pub async fn test_providers(State(state): State<AppState>) -> Json<Vec<ProviderTestResult>> {
    Json(state.downloader.test_providers().await)
}

/// GET /health - Health check
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": if state.downloader.is_accepting() { "ok" } else { "shutting_down" },
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// SSE event name for an event, identical to its serialized `type` tag
pub fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Queued { .. } => "queued",
        Event::Removed { .. } => "removed",
        Event::Checking { .. } => "checking",
        Event::ProviderStatus { .. } => "provider_status",
        Event::Downloading { .. } => "downloading",
        Event::Restarted { .. } => "restarted",
        Event::Extracting { .. } => "extracting",
        Event::Moving { .. } => "moving",
        Event::Paused { .. } => "paused",
        Event::Resumed { .. } => "resumed",
        Event::Completed { .. } => "completed",
        Event::Failed { .. } => "failed",
        Event::Shutdown => "shutdown",
    }
}

/// GET /events - Server-sent events stream
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(state.downloader.subscribe());

    let sse_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(data) => Some(Ok(SseEvent::default().event(event_name(&event)).data(data))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize event");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE client lagged");
            Some(Ok(SseEvent::default()
                .event("error")
                .data(json!({"error": "lagged", "skipped": skipped}).to_string())))
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}
