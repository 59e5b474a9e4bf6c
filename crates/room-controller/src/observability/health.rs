//! Health and status endpoints for the Room Controller.
//!
//! Provides Kubernetes-compatible health endpoints:
//! - `GET /health` - Liveness probe (is the process running?)
//! - `GET /ready` - Readiness probe (can we serve traffic?)
//! - `GET /status` - Registry status (room/worker counts) as JSON
//!
//! # Health State
//!
//! The `HealthState` tracks:
//! - `live`: Always true after startup (process is running)
//! - `ready`: True once the registry is up and accepting rooms

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::actors::registry::{RegistryActorHandle, RegistryStatus};

/// Health state for the Room Controller.
///
/// Tracks liveness and readiness for Kubernetes probes.
#[derive(Debug)]
pub struct HealthState {
    /// Whether the service is live (process running).
    /// Always true after startup initialization.
    live: AtomicBool,
    /// Whether the service is ready to serve traffic.
    /// True once the registry is accepting rooms.
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the service as ready to serve traffic.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the service as not ready (e.g., during shutdown).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Check if the service is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Check if the service is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Shared state for the observability router.
#[derive(Clone)]
struct ObservabilityState {
    health: Arc<HealthState>,
    registry: RegistryActorHandle,
}

/// Create the observability router.
///
/// # Endpoints
///
/// - `GET /health` - Returns 200 if process is running (liveness)
/// - `GET /ready` - Returns 200 if ready to serve traffic, 503 otherwise (readiness)
/// - `GET /status` - Returns registry status as JSON, 503 if the registry is gone
pub fn observability_router(
    health: Arc<HealthState>,
    registry: RegistryActorHandle,
) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ObservabilityState { health, registry })
}

/// Liveness probe handler.
///
/// Returns 200 OK if the process is running.
async fn liveness_handler(State(state): State<ObservabilityState>) -> StatusCode {
    if state.health.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Readiness probe handler.
///
/// Returns 200 OK if the service is ready to serve traffic,
/// 503 Service Unavailable otherwise.
async fn readiness_handler(State(state): State<ObservabilityState>) -> StatusCode {
    if state.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Registry status handler.
async fn status_handler(
    State(state): State<ObservabilityState>,
) -> Result<Json<RegistryStatus>, StatusCode> {
    state
        .registry
        .get_status()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::actors::metrics::ActorMetrics;
    use crate::media::engine::TransportOptions;
    use crate::media::inprocess::InProcessEngine;
    use crate::media::worker::WorkerPool;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use signal_protocol::CodecCapability;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn spawn_registry() -> RegistryActorHandle {
        RegistryActorHandle::new(
            "rc-test".to_string(),
            Arc::new(InProcessEngine::new()),
            WorkerPool::new(2),
            vec![CodecCapability::opus()],
            TransportOptions {
                listen_ip: "0.0.0.0".to_string(),
                announced_ip: "127.0.0.1".to_string(),
                rtc_min_port: 40_000,
                rtc_max_port: 49_999,
            },
            Duration::from_secs(60),
            ActorMetrics::new(),
        )
    }

    fn test_router(health: Arc<HealthState>) -> Router {
        observability_router(health, spawn_registry())
    }

    #[test]
    fn test_health_state_default() {
        let state = HealthState::new();
        assert!(state.is_live(), "Should be live by default");
        assert!(!state.is_ready(), "Should not be ready by default");
    }

    #[test]
    fn test_health_state_set_ready() {
        let state = HealthState::new();

        state.set_ready();
        assert!(state.is_ready(), "Should be ready after set_ready()");

        state.set_not_ready();
        assert!(
            !state.is_ready(),
            "Should not be ready after set_not_ready()"
        );
    }

    #[tokio::test]
    async fn test_liveness_endpoint_returns_ok() {
        let app = test_router(Arc::new(HealthState::new()));

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = app.oneshot(request).await.expect("Failed to execute");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_endpoint_tracks_state() {
        let health = Arc::new(HealthState::new());
        let app = test_router(Arc::clone(&health));

        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        health.set_ready();
        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = app.oneshot(request).await.expect("Failed to execute");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_endpoint_reports_registry() {
        let registry = spawn_registry();
        registry
            .get_or_create_room("r1".to_string())
            .await
            .unwrap();
        let app = observability_router(Arc::new(HealthState::new()), registry);

        let request = Request::builder()
            .uri("/status")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = app.oneshot(request).await.expect("Failed to execute");
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["rcId"], "rc-test");
        assert_eq!(status["roomCount"], 1);
        assert_eq!(status["workerCount"], 2);
        assert_eq!(status["isDraining"], false);
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let app = test_router(Arc::new(HealthState::new()));

        let request = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = app.oneshot(request).await.expect("Failed to execute");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
