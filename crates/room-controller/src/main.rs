//! Room Controller
//!
//! Session orchestrator for the Jamhub audio-conferencing service.
//!
//! # Servers
//!
//! The Room Controller runs one HTTP server:
//! - Health/status endpoints (default: 0.0.0.0:8081)
//!
//! Signaling connections are handled by an embedding transport layer
//! that spawns one `DispatcherActor` per connection; this binary wires
//! up the registry, worker pool, and media engine they share.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize the media engine and worker pool
//! 3. Initialize the actor system (`RegistryActorHandle`)
//! 4. Start the health HTTP server (liveness, readiness, status)
//! 5. Wait for shutdown signal

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use room_controller::actors::{ActorMetrics, RegistryActorHandle};
use room_controller::config::Config;
use room_controller::media::engine::TransportOptions;
use room_controller::media::{InProcessEngine, WorkerPool};
use room_controller::observability::{observability_router, HealthState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for actors before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Room Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        rc_id = %config.rc_id,
        num_workers = config.num_workers,
        announced_ip = %config.announced_ip,
        rtc_min_port = config.rtc_min_port,
        rtc_max_port = config.rtc_max_port,
        health_bind_address = %config.health_bind_address,
        request_timeout_secs = config.request_timeout.as_secs(),
        room_eviction_grace_secs = config.room_eviction_grace.as_secs(),
        "Configuration loaded successfully"
    );

    // Initialize health state
    let health_state = Arc::new(HealthState::new());

    // Initialize the media engine and worker pool
    let engine = Arc::new(InProcessEngine::new());
    let pool = WorkerPool::new(config.num_workers);
    info!(workers = pool.len(), "Media-engine worker pool initialized");

    let transport_options = TransportOptions {
        listen_ip: config.listen_ip.clone(),
        announced_ip: config.announced_ip.clone(),
        rtc_min_port: config.rtc_min_port,
        rtc_max_port: config.rtc_max_port,
    };

    // Initialize actor system
    info!("Initializing actor system...");
    let actor_metrics = ActorMetrics::new();
    let registry = RegistryActorHandle::new(
        config.rc_id.clone(),
        engine,
        pool,
        config.media_codecs(),
        transport_options,
        config.room_eviction_grace,
        Arc::clone(&actor_metrics),
    );
    info!("Actor system initialized");

    // Start health HTTP server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let app = observability_router(Arc::clone(&health_state), registry.clone());

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;
    info!(addr = %health_addr, "Health server bound successfully");

    // Spawn health server task
    let health_shutdown_token = registry.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    health_state.set_ready();
    info!("Room Controller running - press Ctrl+C to shutdown");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so the orchestrator stops sending
    // traffic
    health_state.set_not_ready();

    // Shutdown actor system (drains rooms via its cancellation tree)
    if let Err(e) = registry.shutdown().await {
        warn!(error = %e, "Actor system shutdown error");
    }

    // Give tasks time to shut down
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    info!("Room Controller shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable
/// because without signal handlers, we cannot gracefully shut down the
/// service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
