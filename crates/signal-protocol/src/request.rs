//! Request/response surface of the signaling protocol.
//!
//! Every request names its room; the peer id is implicit in the
//! connection the request arrived on. Each request is acknowledged
//! with exactly one [`SignalingResponse`] or one [`ErrorReply`].

use crate::rtp::{
    DtlsParameters, IceCandidate, IceParameters, MediaKind, RtpCapabilities, RtpParameters,
    TransportRole,
};
use serde::{Deserialize, Serialize};

/// An inbound signaling request from a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "data", rename_all_fields = "camelCase")]
pub enum SignalingRequest {
    /// Fetch the codec capability set of the room's router.
    #[serde(rename = "getRouterRtpCapabilities")]
    GetRouterRtpCapabilities {
        /// Target room.
        room_id: String,
    },

    /// Join a room, creating it on first reference.
    #[serde(rename = "join")]
    Join {
        /// Target room.
        room_id: String,
    },

    /// Create a transport with an explicit role.
    #[serde(rename = "createWebRtcTransport")]
    CreateWebRtcTransport {
        /// Target room.
        room_id: String,
        /// Whether the transport will be used to publish or subscribe.
        direction: TransportRole,
    },

    /// Complete a transport's DTLS handshake.
    #[serde(rename = "connectWebRtcTransport")]
    ConnectWebRtcTransport {
        /// Target room.
        room_id: String,
        /// Transport to connect.
        transport_id: String,
        /// Remote DTLS parameters.
        dtls_parameters: DtlsParameters,
    },

    /// Begin publishing a media stream.
    #[serde(rename = "produce")]
    Produce {
        /// Target room.
        room_id: String,
        /// Send transport to publish over.
        transport_id: String,
        /// Media kind of the stream.
        kind: MediaKind,
        /// Stream RTP parameters.
        rtp_parameters: RtpParameters,
    },

    /// Subscribe to another peer's published stream.
    #[serde(rename = "consume")]
    Consume {
        /// Target room.
        room_id: String,
        /// Peer whose stream to consume.
        producer_peer_id: String,
        /// The requesting peer's declared capabilities.
        rtp_capabilities: RtpCapabilities,
    },

    /// Unpause a consumer created by `consume`.
    #[serde(rename = "resume")]
    Resume {
        /// Target room.
        room_id: String,
        /// Consumer to resume.
        consumer_id: String,
    },
}

impl SignalingRequest {
    /// The room this request targets.
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            SignalingRequest::GetRouterRtpCapabilities { room_id }
            | SignalingRequest::Join { room_id }
            | SignalingRequest::CreateWebRtcTransport { room_id, .. }
            | SignalingRequest::ConnectWebRtcTransport { room_id, .. }
            | SignalingRequest::Produce { room_id, .. }
            | SignalingRequest::Consume { room_id, .. }
            | SignalingRequest::Resume { room_id, .. } => room_id,
        }
    }
}

/// Connection-establishment parameters returned by transport creation,
/// relayed verbatim to the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportParams {
    /// Transport id.
    pub id: String,
    /// Local ICE parameters.
    pub ice_parameters: IceParameters,
    /// Local ICE candidates.
    pub ice_candidates: Vec<IceCandidate>,
    /// Local DTLS parameters.
    pub dtls_parameters: DtlsParameters,
}

/// Connection parameters for a newly created consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerParams {
    /// Consumer id.
    pub id: String,
    /// Source producer id.
    pub producer_id: String,
    /// Media kind of the consumed stream.
    pub kind: MediaKind,
    /// RTP parameters the consuming side must use.
    pub rtp_parameters: RtpParameters,
}

/// A successful acknowledgment payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "data", rename_all_fields = "camelCase")]
pub enum SignalingResponse {
    /// Capability set of the room's router.
    #[serde(rename = "routerRtpCapabilities")]
    RouterRtpCapabilities(RtpCapabilities),

    /// Join acknowledgment listing peers already publishing.
    #[serde(rename = "joined")]
    Joined {
        /// Ids of peers that owned at least one producer before this
        /// peer was registered (never includes the joiner).
        peer_ids: Vec<String>,
    },

    /// Transport-creation acknowledgment.
    #[serde(rename = "transportCreated")]
    TransportCreated(TransportParams),

    /// Transport-connect acknowledgment (no payload).
    #[serde(rename = "transportConnected")]
    TransportConnected,

    /// Produce acknowledgment.
    #[serde(rename = "produced")]
    Produced {
        /// Id of the new producer.
        id: String,
    },

    /// Consume acknowledgment.
    #[serde(rename = "consumed")]
    Consumed(ConsumerParams),

    /// Resume acknowledgment (no payload).
    #[serde(rename = "resumed")]
    Resumed,
}

/// An explicit error acknowledgment.
///
/// Failures are always surfaced as a code/message pair, never as a
/// silently absent response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Numeric error code from the orchestrator's taxonomy.
    pub code: i32,
    /// Client-safe message.
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn join_request_wire_shape() {
        let request = SignalingRequest::Join {
            room_id: "r1".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], "join");
        assert_eq!(json["data"]["roomId"], "r1");
    }

    #[test]
    fn create_transport_carries_direction() {
        let request = SignalingRequest::CreateWebRtcTransport {
            room_id: "r1".to_string(),
            direction: TransportRole::Recv,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], "createWebRtcTransport");
        assert_eq!(json["data"]["direction"], "recv");
    }

    #[test]
    fn consume_request_round_trips() {
        let request = SignalingRequest::Consume {
            room_id: "r1".to_string(),
            producer_peer_id: "peer-a".to_string(),
            rtp_capabilities: RtpCapabilities {
                codecs: vec![crate::rtp::CodecCapability::opus()],
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("producerPeerId"));
        let back: SignalingRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn room_id_accessor_covers_all_variants() {
        let request = SignalingRequest::Resume {
            room_id: "r9".to_string(),
            consumer_id: "c1".to_string(),
        };
        assert_eq!(request.room_id(), "r9");
    }

    #[test]
    fn joined_response_wire_shape() {
        let response = SignalingResponse::Joined {
            peer_ids: vec!["a".to_string()],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["result"], "joined");
        assert_eq!(json["data"]["peerIds"][0], "a");
    }

    #[test]
    fn error_reply_round_trips() {
        let reply = ErrorReply {
            code: 4,
            message: "Room not found".to_string(),
        };
        let json = serde_json::to_string(&reply).unwrap();
        let back: ErrorReply = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reply);
    }
}
