//! Media engine seam.
//!
//! The orchestrator owns no media processing. Everything below the
//! [`engine::MediaEngine`] trait - ICE negotiation, DTLS handshakes,
//! SRTP, RTP routing - belongs to an external provider. The core calls
//! abstract operations (create router, create transport, produce,
//! consume, connect, resume, close) and receives abstract lifecycle
//! events back.
//!
//! - [`worker`] - fixed pool of engine execution contexts with
//!   round-robin assignment and explicit liveness
//! - [`engine`] - the provider trait and its event model
//! - [`inprocess`] - an in-process engine used in development and by
//!   every actor test

pub mod engine;
pub mod inprocess;
pub mod worker;

pub use engine::{EngineError, EngineEvent, MediaEngine, RouterCreated, TransportOptions};
pub use inprocess::InProcessEngine;
pub use worker::{WorkerHandle, WorkerPool};
