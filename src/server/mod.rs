//! Inbound event endpoint
//!
//! One POST endpoint receives CI event notifications, matches them against
//! the configured artifact targets, and enqueues a fetch task per match. The
//! router is an explicit instance owned by the caller — no process-global
//! routing state. The response tells the producer how many targets matched;
//! fetch outcomes themselves are visible only through logs.

use crate::config::{ArtifactConfig, Config};
use crate::error::{Error, Result};
use crate::fetcher::{FetchTask, Fetcher};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Payload data of an inbound event
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventData {
    /// Workflow run identifier
    #[serde(default)]
    pub run_id: i64,
}

/// An inbound CI event notification
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Event {
    /// Event name (e.g. "push")
    #[serde(default)]
    pub event: String,
    /// Source repository as "owner/name"
    #[serde(default)]
    pub repository: String,
    /// Commit hash
    #[serde(default)]
    pub commit: String,
    /// Git ref the run was triggered for
    #[serde(default, rename = "ref")]
    pub git_ref: String,
    /// Head branch or commit
    #[serde(default)]
    pub head: String,
    /// Workflow name
    #[serde(default)]
    pub workflow: String,
    /// Opaque request id assigned by the producer
    #[serde(default, rename = "requestID")]
    pub request_id: String,
    /// Payload data
    #[serde(default)]
    pub data: EventData,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Event event={:?} repo={:?} commit={:?} ref={:?} head={:?} workflow={:?} requestID={:?} runID={}>",
            self.event,
            self.repository,
            self.commit,
            self.git_ref,
            self.head,
            self.workflow,
            self.request_id,
            self.data.run_id,
        )
    }
}

/// Success response: number of targets the event matched
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchResponse {
    /// Count of artifact targets whose filters all held
    pub matches_count: usize,
}

/// Error response body
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Shared state handed to route handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration (immutable after startup)
    pub config: Arc<Config>,
    /// The fetch queue tasks are enqueued into
    pub fetcher: Arc<Fetcher>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(config: Arc<Config>, fetcher: Arc<Fetcher>) -> Self {
        Self { config, fetcher }
    }
}

/// Select the targets an inbound event matches
///
/// A target matches when its event filter is unset or equal to the event
/// name, its workflow filter is unset or equal to the workflow name, and its
/// repository equals the event's repository.
pub fn matching_targets<'a>(targets: &'a [ArtifactConfig], event: &Event) -> Vec<&'a ArtifactConfig> {
    targets
        .iter()
        .filter(|target| {
            target
                .filter
                .event
                .as_deref()
                .is_none_or(|e| e == event.event)
                && target
                    .filter
                    .workflow
                    .as_deref()
                    .is_none_or(|w| w == event.workflow)
                && target.repo == event.repository
        })
        .collect()
}

/// Build the router with the configured event endpoint
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(&state.config.endpoint, post(handle_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle one inbound event notification
///
/// The body is read raw and parsed manually so malformed payloads produce
/// the documented `{"error": ...}` JSON with status 400 instead of a
/// framework rejection.
async fn handle_event(State(state): State<AppState>, body: Bytes) -> Response {
    let event: Event = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "error parsing event body");
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("error parsing body: {e}"),
            );
        }
    };

    info!(event = %event, "received event");

    let matched = matching_targets(&state.config.artifacts, &event);
    let matches_count = matched.len();

    for target in matched {
        state
            .fetcher
            .enqueue(FetchTask {
                run_id: event.data.run_id,
                target: target.clone(),
            })
            .await;
    }

    info!(event = %event, matches_count, "event matched");

    match serde_json::to_vec(&MatchResponse { matches_count }) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "error serializing match response");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("can't serialize response: {e}"),
            )
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, axum::Json(ErrorResponse { error: message })).into_response()
}

/// Serve the router until the shutdown token fires
///
/// Graceful: the listener stops accepting and in-flight requests drain. The
/// caller is expected to bound the drain with a timeout.
pub async fn serve(listener: TcpListener, router: Router, shutdown: CancellationToken) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::Server(e.to_string()))
}
