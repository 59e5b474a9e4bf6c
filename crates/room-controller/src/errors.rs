//! Room Controller error types.
//!
//! Error types map to signaling error codes for client responses.
//! Internal details are logged server-side but not exposed to clients.
//! Operation-level failures (not-found, capability mismatch) are local
//! to the requesting call and never corrupt other peers' state.

use signal_protocol::ErrorReply;
use thiserror::Error;

/// Room Controller error type.
///
/// Maps to signaling error codes:
/// - `*NotFound`: `NOT_FOUND` (4)
/// - `Conflict`: `CONFLICT` (5)
/// - `Engine`, `Internal`: `INTERNAL_ERROR` (6)
/// - `Draining`: `UNAVAILABLE` (7)
/// - `CapabilityMismatch`: `CANNOT_CONSUME` (8)
/// - `NoReceiveTransport`: `NO_RECV_TRANSPORT` (9)
/// - `WorkerFailed`: `DEGRADED` (10)
/// - `Timeout`: `DEADLINE_EXCEEDED` (11)
#[derive(Debug, Error)]
pub enum SignalError {
    /// Referenced room does not exist.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Referenced peer does not exist in the room.
    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    /// Referenced transport does not exist under the peer.
    #[error("Transport not found: {0}")]
    TransportNotFound(String),

    /// The target peer owns no producer to consume from.
    #[error("Producer not found for peer: {0}")]
    ProducerNotFound(String),

    /// Referenced consumer does not exist under the peer.
    #[error("Consumer not found: {0}")]
    ConsumerNotFound(String),

    /// The requesting peer's capabilities cannot consume the target
    /// producer.
    #[error("Peer capabilities cannot consume the producer")]
    CapabilityMismatch,

    /// The peer holds no receive-role transport to consume over.
    #[error("No receive transport available")]
    NoReceiveTransport,

    /// Conflict error (e.g., peer already joined).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The room's pinned worker has died; the room is degraded.
    #[error("Worker failed for room: {0}")]
    WorkerFailed(String),

    /// A provider call exceeded its deadline.
    #[error("Request deadline exceeded")]
    Timeout,

    /// The controller is shutting down.
    #[error("Controller is draining")]
    Draining,

    /// The media engine reported a failure.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignalError {
    /// Returns the signaling error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            SignalError::RoomNotFound(_)
            | SignalError::PeerNotFound(_)
            | SignalError::TransportNotFound(_)
            | SignalError::ProducerNotFound(_)
            | SignalError::ConsumerNotFound(_) => 4, // NOT_FOUND
            SignalError::Conflict(_) => 5,           // CONFLICT
            SignalError::Engine(_) | SignalError::Internal(_) => 6, // INTERNAL_ERROR
            SignalError::Draining => 7,              // UNAVAILABLE
            SignalError::CapabilityMismatch => 8,    // CANNOT_CONSUME
            SignalError::NoReceiveTransport => 9,    // NO_RECV_TRANSPORT
            SignalError::WorkerFailed(_) => 10,      // DEGRADED
            SignalError::Timeout => 11,              // DEADLINE_EXCEEDED
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            SignalError::RoomNotFound(_) => "Room not found".to_string(),
            SignalError::PeerNotFound(_) => "Peer not found".to_string(),
            SignalError::TransportNotFound(_) => "Transport not found".to_string(),
            SignalError::ProducerNotFound(_) => "Producer not found".to_string(),
            SignalError::ConsumerNotFound(_) => "Consumer not found".to_string(),
            SignalError::CapabilityMismatch => {
                "Peer capabilities cannot consume the producer".to_string()
            }
            SignalError::NoReceiveTransport => "No receive transport available".to_string(),
            SignalError::Conflict(msg) => msg.clone(),
            SignalError::WorkerFailed(_) => "Room is degraded, please rejoin later".to_string(),
            SignalError::Timeout => "Request timed out".to_string(),
            SignalError::Draining => "Server is shutting down, please reconnect".to_string(),
            SignalError::Engine(_) | SignalError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }

    /// Build the wire-level error acknowledgment for this error.
    #[must_use]
    pub fn to_reply(&self) -> ErrorReply {
        ErrorReply {
            code: self.error_code(),
            message: self.client_message(),
        }
    }
}
