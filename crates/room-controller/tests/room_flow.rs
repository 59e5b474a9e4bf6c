//! End-to-end signaling flow through the full actor stack.
//!
//! Drives real `DispatcherActor`s against a shared registry and the
//! in-process media engine, exactly the way an embedding transport
//! layer would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use room_controller::actors::{
    ActorMetrics, DispatcherActor, DispatcherActorHandle, RegistryActorHandle,
};
use room_controller::errors::SignalError;
use room_controller::media::engine::TransportOptions;
use room_controller::media::{InProcessEngine, WorkerPool};
use signal_protocol::rtp::RtpCodecParameters;
use signal_protocol::{
    CodecCapability, MediaKind, RoomBroadcast, RtpCapabilities, RtpParameters, SignalingRequest,
    SignalingResponse, TransportParams, TransportRole,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn opus_caps() -> RtpCapabilities {
    RtpCapabilities {
        codecs: vec![CodecCapability::opus()],
    }
}

fn opus_params() -> RtpParameters {
    RtpParameters {
        mid: Some("0".to_string()),
        codecs: vec![RtpCodecParameters {
            mime_type: "audio/opus".to_string(),
            payload_type: 111,
            clock_rate: 48_000,
            channels: Some(2),
            parameters: BTreeMap::new(),
        }],
    }
}

struct Stack {
    registry: RegistryActorHandle,
}

fn spawn_stack(workers: usize) -> Stack {
    let registry = RegistryActorHandle::new(
        "rc-itest".to_string(),
        Arc::new(InProcessEngine::new()),
        WorkerPool::new(workers),
        vec![CodecCapability::opus()],
        TransportOptions {
            listen_ip: "0.0.0.0".to_string(),
            announced_ip: "127.0.0.1".to_string(),
            rtc_min_port: 40_000,
            rtc_max_port: 49_999,
        },
        Duration::from_secs(60),
        ActorMetrics::new(),
    );
    Stack { registry }
}

/// One simulated signaling connection.
struct Client {
    handle: DispatcherActorHandle,
    events: mpsc::Receiver<RoomBroadcast>,
}

fn connect(stack: &Stack, connection_id: &str) -> Client {
    let (tx, rx) = mpsc::channel(16);
    let (handle, _task) = DispatcherActor::spawn(
        connection_id.to_string(),
        stack.registry.clone(),
        tx,
        Duration::from_secs(10),
        CancellationToken::new(),
        ActorMetrics::new(),
    );
    Client {
        handle,
        events: rx,
    }
}

impl Client {
    async fn join(&self, room_id: &str) -> Vec<String> {
        match self
            .handle
            .request(SignalingRequest::Join {
                room_id: room_id.to_string(),
            })
            .await
            .unwrap()
        {
            SignalingResponse::Joined { peer_ids } => peer_ids,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    async fn create_transport(&self, room_id: &str, direction: TransportRole) -> TransportParams {
        match self
            .handle
            .request(SignalingRequest::CreateWebRtcTransport {
                room_id: room_id.to_string(),
                direction,
            })
            .await
            .unwrap()
        {
            SignalingResponse::TransportCreated(params) => params,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    async fn connect_transport(&self, room_id: &str, transport: &TransportParams) {
        let response = self
            .handle
            .request(SignalingRequest::ConnectWebRtcTransport {
                room_id: room_id.to_string(),
                transport_id: transport.id.clone(),
                dtls_parameters: transport.dtls_parameters.clone(),
            })
            .await
            .unwrap();
        assert_eq!(response, SignalingResponse::TransportConnected);
    }

    async fn produce(&self, room_id: &str, transport_id: &str) -> String {
        match self
            .handle
            .request(SignalingRequest::Produce {
                room_id: room_id.to_string(),
                transport_id: transport_id.to_string(),
                kind: MediaKind::Audio,
                rtp_parameters: opus_params(),
            })
            .await
            .unwrap()
        {
            SignalingResponse::Produced { id } => id,
            other => panic!("unexpected response: {other:?}"),
        }
    }
}

/// The canonical two-peer session: "a" publishes, "b" joins later,
/// consumes, and then "a" disconnects.
#[tokio::test]
async fn two_peer_session_lifecycle() {
    let stack = spawn_stack(1);
    let a = connect(&stack, "a");
    let mut b = connect(&stack, "b");

    // Room "r1" is created lazily on a's first join.
    let peers = a.join("r1").await;
    assert!(peers.is_empty());

    // "a" publishes audio.
    let t1 = a.create_transport("r1", TransportRole::Send).await;
    a.connect_transport("r1", &t1).await;
    let p1 = a.produce("r1", &t1.id).await;

    // "b" joins and is told "a" is already publishing.
    let peers = b.join("r1").await;
    assert_eq!(peers, vec!["a".to_string()]);

    // "b" creates a send and a receive transport, then consumes from
    // "a" over the receive one.
    let t2 = b.create_transport("r1", TransportRole::Send).await;
    b.connect_transport("r1", &t2).await;
    let t3 = b.create_transport("r1", TransportRole::Recv).await;
    b.connect_transport("r1", &t3).await;

    let consumer = match b
        .handle
        .request(SignalingRequest::Consume {
            room_id: "r1".to_string(),
            producer_peer_id: "a".to_string(),
            rtp_capabilities: opus_caps(),
        })
        .await
        .unwrap()
    {
        SignalingResponse::Consumed(params) => params,
        other => panic!("unexpected response: {other:?}"),
    };
    assert_eq!(consumer.producer_id, p1);
    assert_eq!(consumer.kind, MediaKind::Audio);

    let response = b
        .handle
        .request(SignalingRequest::Resume {
            room_id: "r1".to_string(),
            consumer_id: consumer.id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(response, SignalingResponse::Resumed);

    // "a" disconnects: "b" is notified and its consumer is reaped.
    a.handle.disconnect().await.unwrap();

    let event = b.events.recv().await.unwrap();
    assert_eq!(
        event,
        RoomBroadcast::PeerClosed {
            peer_id: "a".to_string()
        }
    );

    let room = stack.registry.get_room("r1".to_string()).await.unwrap();
    let state = room.get_state().await.unwrap();
    assert_eq!(state.peer_count, 1);
    assert_eq!(state.peers[0].peer_id, "b");
    assert_eq!(state.peers[0].consumer_count, 0);

    // Resuming the reaped consumer stays a no-op.
    let response = b
        .handle
        .request(SignalingRequest::Resume {
            room_id: "r1".to_string(),
            consumer_id: consumer.id,
        })
        .await
        .unwrap();
    assert_eq!(response, SignalingResponse::Resumed);
}

#[tokio::test]
async fn new_producer_broadcast_reaches_existing_peers_only() {
    let stack = spawn_stack(1);
    let mut a = connect(&stack, "a");
    let mut b = connect(&stack, "b");

    a.join("r1").await;
    b.join("r1").await;

    let t = a.create_transport("r1", TransportRole::Send).await;
    a.connect_transport("r1", &t).await;
    a.produce("r1", &t.id).await;

    let event = b.events.recv().await.unwrap();
    assert_eq!(
        event,
        RoomBroadcast::NewProducer {
            peer_id: "a".to_string()
        }
    );
    assert!(
        a.events.try_recv().is_err(),
        "producer must not be notified about itself"
    );
}

#[tokio::test]
async fn rooms_round_robin_across_the_worker_pool() {
    let stack = spawn_stack(2);

    let mut worker_ids = Vec::new();
    for i in 0..4 {
        let client = connect(&stack, &format!("peer-{i}"));
        client.join(&format!("room-{i}")).await;

        let room = stack
            .registry
            .get_room(format!("room-{i}"))
            .await
            .unwrap();
        worker_ids.push(room.get_state().await.unwrap().worker_id);
    }

    assert_eq!(worker_ids, vec![0, 1, 0, 1]);
}

#[tokio::test]
async fn consume_before_any_producer_fails_cleanly() {
    let stack = spawn_stack(1);
    let a = connect(&stack, "a");
    let b = connect(&stack, "b");

    a.join("r1").await;
    b.join("r1").await;
    let t = b.create_transport("r1", TransportRole::Recv).await;
    b.connect_transport("r1", &t).await;

    let result = b
        .handle
        .request(SignalingRequest::Consume {
            room_id: "r1".to_string(),
            producer_peer_id: "a".to_string(),
            rtp_capabilities: opus_caps(),
        })
        .await;
    assert!(matches!(result, Err(SignalError::ProducerNotFound(_))));

    // The failed consume left no state behind.
    let room = stack.registry.get_room("r1".to_string()).await.unwrap();
    let state = room.get_state().await.unwrap();
    let peer_b = state
        .peers
        .iter()
        .find(|p| p.peer_id == "b")
        .expect("peer b present");
    assert_eq!(peer_b.consumer_count, 0);
}

#[tokio::test]
async fn wire_level_error_replies_carry_codes_not_internals() {
    let stack = spawn_stack(1);
    let a = connect(&stack, "a");

    let err = a
        .handle
        .request(SignalingRequest::GetRouterRtpCapabilities {
            room_id: "room-with-secret-name".to_string(),
        })
        .await
        .unwrap_err();
    let reply = err.to_reply();
    assert_eq!(reply.code, 4);
    assert_eq!(reply.message, "Room not found");
    assert!(!reply.message.contains("secret"));
}
