//! Room-wide broadcast events.
//!
//! Broadcasts are fire-and-forget: the orchestrator fans them out to
//! every connection currently in the room (the originating peer
//! excluded) and never waits for acknowledgment.

use serde::{Deserialize, Serialize};

/// A server-originated event fanned out to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum RoomBroadcast {
    /// A peer's `produce` succeeded; subscribers may now consume.
    NewProducer {
        /// Id of the publishing peer.
        peer_id: String,
    },

    /// A peer was removed (disconnect, explicit leave, or cleanup).
    PeerClosed {
        /// Id of the removed peer.
        peer_id: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn new_producer_wire_shape() {
        let event = RoomBroadcast::NewProducer {
            peer_id: "peer-a".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "new-producer");
        assert_eq!(json["data"]["peerId"], "peer-a");
    }

    #[test]
    fn peer_closed_round_trips() {
        let event = RoomBroadcast::PeerClosed {
            peer_id: "peer-b".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("peer-closed"));
        let back: RoomBroadcast = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
