//! axum routers and request handlers.
//!
//! Routes:
//! - `GET /{*path}`  - Policy document for the authenticated caller (any path)
//! - `GET /metrics`  - Prometheus metrics (metrics router only)

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{error, info, instrument, warn};

use crate::auth::gate::{self, AuthError};
use crate::metrics::{AuthOutcome, MetricsRegistry, ReadResult};
use crate::policy::ResolveError;
use crate::AppState;

const INTERNAL_ERROR_BODY: &str = "Internal server error";

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Build the policy [`Router`].  Every path is served by the same gate.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_policies))
        .route("/{*path}", get(handle_policies))
        .with_state(state)
}

/// Build the metrics [`Router`] served on the optional metrics listener.
pub fn create_metrics_router(metrics: MetricsRegistry) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .with_state(metrics)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /{*path}`
///
/// Challenges unless the request carries valid Basic credentials, then
/// returns the caller's own policy resource.
#[instrument(skip_all, fields(path = %uri.path()))]
async fn handle_policies(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let metrics = &state.metrics.metrics;

    // 1. Authenticate.  The username stays local to this request.
    let username = match gate::authenticate(&state.credentials, &headers) {
        Ok(username) => {
            metrics.record_auth(AuthOutcome::Verified);
            username
        }
        Err(reason) => {
            warn!(reason = reason.kind(), "authentication failed");
            metrics.record_auth(match reason {
                AuthError::MissingAuth => AuthOutcome::Missing,
                AuthError::MalformedAuthHeader => AuthOutcome::Malformed,
                AuthError::InvalidCredentials => AuthOutcome::Invalid,
            });
            return Err(AppError::Unauthorized {
                reason,
                challenge: state.challenge.clone(),
            });
        }
    };

    // 2. Resolve the caller's own policy resource.
    let started = Instant::now();
    let result = state.resolver.resolve(&username).await;
    let elapsed = started.elapsed().as_secs_f64();

    let body = match result {
        Ok(body) => {
            metrics.record_read(ReadResult::Ok, elapsed);
            body
        }
        Err(err) => {
            metrics.record_read(
                match err {
                    ResolveError::NotFound(_) => ReadResult::NotFound,
                    ResolveError::IoFailure(_) => ReadResult::IoFailure,
                },
                elapsed,
            );
            return Err(AppError::Internal(err));
        }
    };

    info!(%username, bytes = body.len(), "served policies");
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, state.content_type.clone())],
        body,
    )
        .into_response())
}

/// `GET /metrics`
async fn handle_metrics(State(metrics): State<MetricsRegistry>) -> Response {
    match metrics.encode() {
        Ok(buf) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            buf,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Application-level error type that maps cleanly to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The caller did not present valid credentials.
    Unauthorized {
        reason: AuthError,
        challenge: HeaderValue,
    },
    /// The caller is authenticated but its policy resource is unavailable.
    Internal(ResolveError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized { reason, challenge } => (
                StatusCode::UNAUTHORIZED,
                [
                    (header::WWW_AUTHENTICATE, challenge),
                    (header::CONTENT_TYPE, HeaderValue::from_static("text/html")),
                ],
                reason.body(),
            )
                .into_response(),
            AppError::Internal(err) => {
                error!(error = %err, "policy resolution failed");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
