//! Jamhub Room Controller Library
//!
//! This library provides the core functionality for the Jamhub Room
//! Controller - the session orchestrator for a real-time
//! audio-conferencing service built on an SFU media engine:
//!
//! - Room lifecycle (lazy creation, worker pinning, idle eviction)
//! - Peer lifecycle and transport/producer/consumer bookkeeping
//! - Signaling request dispatch with per-request deadlines
//! - Media-engine worker pool with round-robin assignment
//!
//! # Architecture
//!
//! The controller uses an actor model hierarchy:
//!
//! ```text
//! RegistryActor (singleton per controller instance)
//! └── supervises N RoomActors
//!     └── RoomActor (one per active room)
//!         ├── owns peer state
//!         └── reconciles media-engine lifecycle events
//!
//! DispatcherActor (one per signaling connection)
//! └── resolves requests against the registry and rooms
//! ```
//!
//! # Key Design Decisions
//!
//! - **Serialized room creation**: first-joins for the same room id go
//!   through the registry mailbox, so duplicate-creation races cannot
//!   happen
//! - **Explicit transport roles**: clients declare send/recv at
//!   transport creation instead of the controller guessing from
//!   producer placement
//! - **Paused-first consumers**: consumers start paused and are
//!   resumed by the client, so no media is lost to a half-built
//!   receive pipeline
//! - **Grace-period eviction**: empty rooms survive a configurable
//!   grace period before their router is torn down
//!
//! # Modules
//!
//! - [`actors`] - Actor model implementation
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with signaling error codes
//! - [`media`] - Media-engine seam (provider trait, worker pool)
//! - [`observability`] - Health and status endpoints

pub mod actors;
pub mod config;
pub mod errors;
pub mod media;
pub mod observability;
