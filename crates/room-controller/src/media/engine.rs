//! Media-engine provider trait.
//!
//! The trait models the exact surface the orchestrator needs and
//! nothing more. Router capabilities and transport/consumer parameter
//! payloads are the wire types from `signal-protocol`, so a provider
//! hands back exactly what gets relayed to clients.
//!
//! Lifecycle events flow the other way: each router created through
//! the trait carries an event channel, and providers push
//! [`EngineEvent`]s on it when objects close underneath the
//! orchestrator (a transport dying mid-session, a producer closing
//! because its transport went away). Room state reconciles against
//! those events.

use async_trait::async_trait;
use signal_protocol::{
    ConsumerParams, DtlsParameters, MediaKind, RtpCapabilities, RtpParameters, TransportParams,
};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::media::worker::WorkerHandle;

/// Failure reported by a media-engine provider.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The referenced engine object does not exist (closed or never
    /// created).
    #[error("Engine object not found: {0}")]
    NotFound(String),

    /// The worker backing the call is dead.
    #[error("Worker {0} is dead")]
    WorkerDead(usize),

    /// Any other provider failure.
    #[error("{0}")]
    Failure(String),
}

/// Out-of-band lifecycle event pushed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A transport closed underneath the orchestrator. Producers and
    /// consumers riding it are gone too; the provider also emits
    /// `ProducerClosed` for each producer so downstream consumers can
    /// be reconciled.
    TransportClosed { transport_id: String },

    /// A producer closed. Consumers sourced from it are dead.
    ProducerClosed { producer_id: String },
}

/// Result of creating a router.
pub struct RouterCreated {
    /// Provider-assigned router ID.
    pub router_id: String,

    /// The router's full RTP capabilities, relayed verbatim to
    /// clients for negotiation.
    pub capabilities: RtpCapabilities,

    /// Lifecycle events for objects under this router.
    pub events: mpsc::Receiver<EngineEvent>,
}

/// Media transport settings passed to the provider on every transport
/// creation. Derived from process configuration.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// IP the transport listens on.
    pub listen_ip: String,

    /// IP announced in ICE candidates.
    pub announced_ip: String,

    /// Lowest RTC port the provider may allocate.
    pub rtc_min_port: u16,

    /// Highest RTC port the provider may allocate.
    pub rtc_max_port: u16,
}

/// The provider seam between the orchestrator and the media engine.
///
/// Implementations must be safe to call concurrently; the
/// orchestrator shares one engine across all rooms.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create a router on the given worker with the given codec set.
    async fn create_router(
        &self,
        worker: &WorkerHandle,
        codecs: Vec<signal_protocol::CodecCapability>,
    ) -> Result<RouterCreated, EngineError>;

    /// Create a WebRTC transport under a router and return the
    /// client-facing connection parameters.
    async fn create_transport(
        &self,
        router_id: &str,
        options: &TransportOptions,
    ) -> Result<TransportParams, EngineError>;

    /// Complete the DTLS handshake for a transport using the
    /// client-supplied parameters.
    async fn connect_transport(
        &self,
        transport_id: &str,
        dtls_parameters: DtlsParameters,
    ) -> Result<(), EngineError>;

    /// Create a producer on a transport. Returns the provider-assigned
    /// producer ID.
    async fn produce(
        &self,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<String, EngineError>;

    /// Whether the given capabilities can consume the given producer
    /// under the router's negotiation rules.
    async fn can_consume(
        &self,
        router_id: &str,
        producer_id: &str,
        capabilities: &RtpCapabilities,
    ) -> Result<bool, EngineError>;

    /// Create a consumer on a transport for a producer.
    ///
    /// Consumers start paused; the client resumes once its receive
    /// pipeline is wired, so no media is lost to a half-built
    /// pipeline.
    async fn consume(
        &self,
        transport_id: &str,
        producer_id: &str,
        capabilities: &RtpCapabilities,
        paused: bool,
    ) -> Result<ConsumerParams, EngineError>;

    /// Resume a paused consumer. Resuming an already-running or
    /// already-closed consumer is a no-op.
    async fn resume_consumer(&self, consumer_id: &str) -> Result<(), EngineError>;

    /// Close a transport. The provider cascades the close to producers
    /// and consumers riding it and emits the corresponding events.
    async fn close_transport(&self, transport_id: &str) -> Result<(), EngineError>;

    /// Close a router and everything under it. Used at room teardown;
    /// no events are emitted since the room is already gone.
    async fn close_router(&self, router_id: &str) -> Result<(), EngineError>;
}
