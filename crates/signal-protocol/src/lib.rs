//! Signaling protocol for the Jamhub room controller.
//!
//! This crate defines the JSON wire surface that peers use to negotiate
//! media exchange with the session orchestrator:
//!
//! - [`request`] - request/response pairs carried over the per-peer
//!   duplex channel (every request names its room)
//! - [`event`] - fire-and-forget broadcasts fanned out to a room
//! - [`rtp`] - the RTP/ICE/DTLS parameter model relayed between peers
//!   and the media engine, including codec capability matching
//!
//! The types here are pure data; all orchestration lives in the
//! `room-controller` crate.

#![warn(clippy::pedantic)]

pub mod event;
pub mod request;
pub mod rtp;

pub use event::RoomBroadcast;
pub use request::{ConsumerParams, ErrorReply, SignalingRequest, SignalingResponse, TransportParams};
pub use rtp::{
    CodecCapability, DtlsParameters, IceCandidate, IceParameters, MediaKind, RtpCapabilities,
    RtpParameters, TransportRole,
};
