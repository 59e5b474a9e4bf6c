//! Room actor: one per active room.
//!
//! Owns the room's peer map and the transport/producer/consumer
//! bookkeeping under each peer. All mutation flows through the actor
//! mailbox, so every operation observes a sequentially consistent
//! view of the room. Provider lifecycle events (transport closed,
//! producer closed) arrive on a dedicated channel and are reconciled
//! ahead of new requests.
//!
//! The room is pinned at creation to one media-engine worker and one
//! provider router; both bindings last for the room's whole lifetime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use signal_protocol::{
    ConsumerParams, DtlsParameters, MediaKind, RoomBroadcast, RtpCapabilities, RtpParameters,
    TransportParams, TransportRole,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::actors::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::errors::SignalError;
use crate::media::engine::{EngineError, EngineEvent, MediaEngine, RouterCreated, TransportOptions};
use crate::media::worker::WorkerHandle;

/// Channel buffer size for room actor mailboxes.
const ROOM_CHANNEL_BUFFER: usize = 100;

/// Deadline for any single provider call. The room actor blocks its
/// mailbox while a call is in flight, so a stalled provider must
/// surface a timeout rather than wedge the room.
const ENGINE_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a peer joining a room: the ids of peers that are
/// already producing, so the new peer knows whom to consume from.
#[derive(Debug, Clone)]
pub struct JoinResult {
    pub peer_ids: Vec<String>,
}

/// Point-in-time view of room state, used by the registry's eviction
/// sweep and by tests.
#[derive(Debug, Clone)]
pub struct RoomStateSnapshot {
    pub room_id: String,
    pub worker_id: usize,
    pub degraded: bool,
    pub peer_count: usize,
    pub peers: Vec<PeerSnapshot>,
}

/// Per-peer counts within a [`RoomStateSnapshot`].
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub peer_id: String,
    pub transport_count: usize,
    pub producer_count: usize,
    pub consumer_count: usize,
}

/// Messages handled by the `RoomActor`.
enum RoomMessage {
    Join {
        peer_id: String,
        notify: mpsc::Sender<RoomBroadcast>,
        respond_to: oneshot::Sender<Result<JoinResult, SignalError>>,
    },
    CreateTransport {
        peer_id: String,
        role: TransportRole,
        respond_to: oneshot::Sender<Result<TransportParams, SignalError>>,
    },
    ConnectTransport {
        peer_id: String,
        transport_id: String,
        dtls_parameters: DtlsParameters,
        respond_to: oneshot::Sender<Result<(), SignalError>>,
    },
    Produce {
        peer_id: String,
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        respond_to: oneshot::Sender<Result<String, SignalError>>,
    },
    Consume {
        peer_id: String,
        producer_peer_id: String,
        rtp_capabilities: RtpCapabilities,
        respond_to: oneshot::Sender<Result<ConsumerParams, SignalError>>,
    },
    ResumeConsumer {
        peer_id: String,
        consumer_id: String,
        respond_to: oneshot::Sender<Result<(), SignalError>>,
    },
    RemovePeer {
        peer_id: String,
        respond_to: oneshot::Sender<()>,
    },
    GetState {
        respond_to: oneshot::Sender<RoomStateSnapshot>,
    },
}

/// Handle to a `RoomActor`.
#[derive(Clone)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    room_id: String,
    capabilities: RtpCapabilities,
}

impl RoomActorHandle {
    /// Get the room ID.
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// The room router's RTP capabilities. Fixed for the room's
    /// lifetime, so no actor round trip is needed.
    #[must_use]
    pub fn capabilities(&self) -> &RtpCapabilities {
        &self.capabilities
    }

    /// Cancel the room actor. Used by the registry at eviction and
    /// shutdown.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Add a peer to the room. Returns the ids of peers already
    /// producing. `notify` receives room broadcasts for this peer.
    pub async fn join(
        &self,
        peer_id: String,
        notify: mpsc::Sender<RoomBroadcast>,
    ) -> Result<JoinResult, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::Join {
                peer_id,
                notify,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Create a transport for a peer with an explicit role.
    pub async fn create_transport(
        &self,
        peer_id: String,
        role: TransportRole,
    ) -> Result<TransportParams, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::CreateTransport {
                peer_id,
                role,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Complete the DTLS handshake for a peer's transport.
    pub async fn connect_transport(
        &self,
        peer_id: String,
        transport_id: String,
        dtls_parameters: DtlsParameters,
    ) -> Result<(), SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::ConnectTransport {
                peer_id,
                transport_id,
                dtls_parameters,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Create a producer on a peer's transport. Returns the producer
    /// ID.
    pub async fn produce(
        &self,
        peer_id: String,
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<String, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::Produce {
                peer_id,
                transport_id,
                kind,
                rtp_parameters,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Consume from another peer's producer.
    pub async fn consume(
        &self,
        peer_id: String,
        producer_peer_id: String,
        rtp_capabilities: RtpCapabilities,
    ) -> Result<ConsumerParams, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::Consume {
                peer_id,
                producer_peer_id,
                rtp_capabilities,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Resume a paused consumer. No-op if the consumer is already
    /// gone.
    pub async fn resume_consumer(
        &self,
        peer_id: String,
        consumer_id: String,
    ) -> Result<(), SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::ResumeConsumer {
                peer_id,
                consumer_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Remove a peer and everything it owns. Idempotent.
    pub async fn remove_peer(&self, peer_id: String) -> Result<(), SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::RemovePeer {
                peer_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))
    }

    /// Snapshot the room's current state.
    pub async fn get_state(&self) -> Result<RoomStateSnapshot, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::GetState { respond_to: tx })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))
    }
}

/// A transport owned by a peer.
struct TransportEntry {
    role: TransportRole,
    /// Creation order within the room, for deterministic selection.
    sequence: u64,
}

/// A producer owned by a peer.
struct ProducerEntry {
    transport_id: String,
    /// Creation order within the room; consumption targets the
    /// lowest-sequence producer of the target peer.
    sequence: u64,
}

/// A consumer owned by a peer.
struct ConsumerEntry {
    producer_id: String,
    transport_id: String,
}

/// One connected participant.
struct Peer {
    notify: mpsc::Sender<RoomBroadcast>,
    transports: HashMap<String, TransportEntry>,
    producers: HashMap<String, ProducerEntry>,
    consumers: HashMap<String, ConsumerEntry>,
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    /// Room ID.
    room_id: String,
    /// Provider router this room is bound to.
    router_id: String,
    /// Worker the room is pinned to.
    worker: WorkerHandle,
    /// Shared media engine.
    engine: Arc<dyn MediaEngine>,
    /// Transport settings passed to the provider.
    transport_options: TransportOptions,
    /// Message receiver.
    receiver: mpsc::Receiver<RoomMessage>,
    /// Provider lifecycle events for this room's router.
    engine_events: mpsc::Receiver<EngineEvent>,
    /// Cancellation token (child of the registry's token).
    cancel_token: CancellationToken,
    /// Peers by ID.
    peers: HashMap<String, Peer>,
    /// Monotonic creation counter for transports and producers.
    next_sequence: u64,
    /// Shared actor metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RoomActor {
    /// Spawn a new room actor bound to a freshly created router.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        room_id: String,
        router: RouterCreated,
        worker: WorkerHandle,
        engine: Arc<dyn MediaEngine>,
        transport_options: TransportOptions,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let capabilities = router.capabilities.clone();
        let actor = Self {
            room_id: room_id.clone(),
            router_id: router.router_id,
            worker,
            engine,
            transport_options,
            receiver,
            engine_events: router.events,
            cancel_token: cancel_token.clone(),
            peers: HashMap::new(),
            next_sequence: 0,
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, &room_id),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            room_id,
            capabilities,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.room", fields(room_id = %self.room_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            router_id = %self.router_id,
            worker_id = self.worker.id(),
            "RoomActor started"
        );

        loop {
            tokio::select! {
                // Provider events are reconciled before new requests so
                // operations never observe stale transport/producer state.
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.room",
                        room_id = %self.room_id,
                        "RoomActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                event = self.engine_events.recv() => {
                    match event {
                        Some(event) => self.handle_engine_event(event),
                        None => {
                            // Provider dropped the event channel; the
                            // router is gone and the room cannot recover.
                            warn!(
                                target: "rc.actor.room",
                                room_id = %self.room_id,
                                "Provider event channel closed, shutting room down"
                            );
                            self.graceful_shutdown().await;
                            break;
                        }
                    }
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rc.actor.room",
                                room_id = %self.room_id,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            peers = self.peers.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                peer_id,
                notify,
                respond_to,
            } => {
                let result = self.handle_join(peer_id, notify);
                let _ = respond_to.send(result);
            }

            RoomMessage::CreateTransport {
                peer_id,
                role,
                respond_to,
            } => {
                let result = self.handle_create_transport(&peer_id, role).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::ConnectTransport {
                peer_id,
                transport_id,
                dtls_parameters,
                respond_to,
            } => {
                let result = self
                    .handle_connect_transport(&peer_id, &transport_id, dtls_parameters)
                    .await;
                let _ = respond_to.send(result);
            }

            RoomMessage::Produce {
                peer_id,
                transport_id,
                kind,
                rtp_parameters,
                respond_to,
            } => {
                let result = self
                    .handle_produce(&peer_id, &transport_id, kind, rtp_parameters)
                    .await;
                let _ = respond_to.send(result);
            }

            RoomMessage::Consume {
                peer_id,
                producer_peer_id,
                rtp_capabilities,
                respond_to,
            } => {
                let result = self
                    .handle_consume(&peer_id, &producer_peer_id, &rtp_capabilities)
                    .await;
                let _ = respond_to.send(result);
            }

            RoomMessage::ResumeConsumer {
                peer_id,
                consumer_id,
                respond_to,
            } => {
                let result = self.handle_resume_consumer(&peer_id, &consumer_id).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::RemovePeer {
                peer_id,
                respond_to,
            } => {
                self.handle_remove_peer(&peer_id).await;
                let _ = respond_to.send(());
            }

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    /// Add a peer. The returned peer list is computed before the new
    /// peer is registered, so a peer never sees itself.
    fn handle_join(
        &mut self,
        peer_id: String,
        notify: mpsc::Sender<RoomBroadcast>,
    ) -> Result<JoinResult, SignalError> {
        if self.peers.contains_key(&peer_id) {
            return Err(SignalError::Conflict(format!(
                "Peer {peer_id} already joined"
            )));
        }

        let peer_ids: Vec<String> = self
            .peers
            .iter()
            .filter(|(_, peer)| !peer.producers.is_empty())
            .map(|(id, _)| id.clone())
            .collect();

        self.peers.insert(
            peer_id.clone(),
            Peer {
                notify,
                transports: HashMap::new(),
                producers: HashMap::new(),
                consumers: HashMap::new(),
            },
        );

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            peer_id = %peer_id,
            peers = self.peers.len(),
            "Peer joined"
        );

        Ok(JoinResult { peer_ids })
    }

    async fn handle_create_transport(
        &mut self,
        peer_id: &str,
        role: TransportRole,
    ) -> Result<TransportParams, SignalError> {
        if !self.peers.contains_key(peer_id) {
            return Err(SignalError::PeerNotFound(peer_id.to_string()));
        }
        self.ensure_worker_live()?;

        let params = self
            .engine_call(
                self.engine
                    .create_transport(&self.router_id, &self.transport_options),
            )
            .await?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.transports
                .insert(params.id.clone(), TransportEntry { role, sequence });
        }

        debug!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            peer_id = %peer_id,
            transport_id = %params.id,
            role = ?role,
            "Transport created"
        );

        Ok(params)
    }

    async fn handle_connect_transport(
        &mut self,
        peer_id: &str,
        transport_id: &str,
        dtls_parameters: DtlsParameters,
    ) -> Result<(), SignalError> {
        let peer = self
            .peers
            .get(peer_id)
            .ok_or_else(|| SignalError::PeerNotFound(peer_id.to_string()))?;
        if !peer.transports.contains_key(transport_id) {
            return Err(SignalError::TransportNotFound(transport_id.to_string()));
        }
        self.ensure_worker_live()?;

        self.engine_call(self.engine.connect_transport(transport_id, dtls_parameters))
            .await
    }

    async fn handle_produce(
        &mut self,
        peer_id: &str,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<String, SignalError> {
        let peer = self
            .peers
            .get(peer_id)
            .ok_or_else(|| SignalError::PeerNotFound(peer_id.to_string()))?;
        if !peer.transports.contains_key(transport_id) {
            return Err(SignalError::TransportNotFound(transport_id.to_string()));
        }
        self.ensure_worker_live()?;

        let producer_id = self
            .engine_call(self.engine.produce(transport_id, kind, rtp_parameters))
            .await?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.producers.insert(
                producer_id.clone(),
                ProducerEntry {
                    transport_id: transport_id.to_string(),
                    sequence,
                },
            );
        }

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            peer_id = %peer_id,
            producer_id = %producer_id,
            kind = kind.as_str(),
            "Producer created"
        );

        self.broadcast(
            peer_id,
            RoomBroadcast::NewProducer {
                peer_id: peer_id.to_string(),
            },
        );

        Ok(producer_id)
    }

    async fn handle_consume(
        &mut self,
        peer_id: &str,
        producer_peer_id: &str,
        rtp_capabilities: &RtpCapabilities,
    ) -> Result<ConsumerParams, SignalError> {
        let consumer_peer = self
            .peers
            .get(peer_id)
            .ok_or_else(|| SignalError::PeerNotFound(peer_id.to_string()))?;

        // Lowest-sequence producer of the target peer: deterministic
        // under multiple producers, identical to insertion order under
        // the common single-producer case.
        let producer_id = self
            .peers
            .get(producer_peer_id)
            .and_then(|peer| {
                peer.producers
                    .iter()
                    .min_by_key(|(_, entry)| entry.sequence)
                    .map(|(id, _)| id.clone())
            })
            .ok_or_else(|| SignalError::ProducerNotFound(producer_peer_id.to_string()))?;

        // Receive transports are picked by their declared role, lowest
        // creation sequence first.
        let transport_id = consumer_peer
            .transports
            .iter()
            .filter(|(_, entry)| entry.role == TransportRole::Recv)
            .min_by_key(|(_, entry)| entry.sequence)
            .map(|(id, _)| id.clone())
            .ok_or(SignalError::NoReceiveTransport)?;

        self.ensure_worker_live()?;

        let can_consume = self
            .engine_call(
                self.engine
                    .can_consume(&self.router_id, &producer_id, rtp_capabilities),
            )
            .await?;
        if !can_consume {
            return Err(SignalError::CapabilityMismatch);
        }

        // Consumers start paused; the client resumes once its receive
        // pipeline is ready.
        let params = self
            .engine_call(
                self.engine
                    .consume(&transport_id, &producer_id, rtp_capabilities, true),
            )
            .await?;

        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.consumers.insert(
                params.id.clone(),
                ConsumerEntry {
                    producer_id: params.producer_id.clone(),
                    transport_id,
                },
            );
        }

        debug!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            peer_id = %peer_id,
            producer_peer_id = %producer_peer_id,
            consumer_id = %params.id,
            "Consumer created (paused)"
        );

        Ok(params)
    }

    /// Resume a consumer. A consumer already removed by a closure
    /// race is a no-op, not an error.
    async fn handle_resume_consumer(
        &mut self,
        peer_id: &str,
        consumer_id: &str,
    ) -> Result<(), SignalError> {
        let peer = self
            .peers
            .get(peer_id)
            .ok_or_else(|| SignalError::PeerNotFound(peer_id.to_string()))?;

        if !peer.consumers.contains_key(consumer_id) {
            debug!(
                target: "rc.actor.room",
                room_id = %self.room_id,
                peer_id = %peer_id,
                consumer_id = %consumer_id,
                "Resume on absent consumer ignored"
            );
            return Ok(());
        }
        self.ensure_worker_live()?;

        self.engine_call(self.engine.resume_consumer(consumer_id))
            .await
    }

    /// Remove a peer and close everything it owns. Idempotent.
    ///
    /// Closing the peer's transports makes the provider cascade-close
    /// its producers; the resulting producer-closed events reap other
    /// peers' consumers of those producers.
    async fn handle_remove_peer(&mut self, peer_id: &str) {
        let Some(peer) = self.peers.remove(peer_id) else {
            debug!(
                target: "rc.actor.room",
                room_id = %self.room_id,
                peer_id = %peer_id,
                "RemovePeer for unknown peer ignored"
            );
            return;
        };

        for transport_id in peer.transports.keys() {
            if let Err(e) = self
                .engine_call(self.engine.close_transport(transport_id))
                .await
            {
                warn!(
                    target: "rc.actor.room",
                    room_id = %self.room_id,
                    peer_id = %peer_id,
                    transport_id = %transport_id,
                    error = %e,
                    "Failed to close transport during peer removal"
                );
            }
        }

        self.broadcast(
            peer_id,
            RoomBroadcast::PeerClosed {
                peer_id: peer_id.to_string(),
            },
        );

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            peer_id = %peer_id,
            peers = self.peers.len(),
            "Peer removed"
        );
    }

    /// Reconcile a provider lifecycle event against the peer maps.
    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::TransportClosed { transport_id } => {
                for peer in self.peers.values_mut() {
                    if peer.transports.remove(&transport_id).is_some() {
                        peer.producers
                            .retain(|_, entry| entry.transport_id != transport_id);
                    }
                    peer.consumers
                        .retain(|_, entry| entry.transport_id != transport_id);
                }
                debug!(
                    target: "rc.actor.room",
                    room_id = %self.room_id,
                    transport_id = %transport_id,
                    "Transport closed by provider"
                );
            }

            EngineEvent::ProducerClosed { producer_id } => {
                for peer in self.peers.values_mut() {
                    peer.producers.remove(&producer_id);
                    peer.consumers
                        .retain(|_, entry| entry.producer_id != producer_id);
                }
                debug!(
                    target: "rc.actor.room",
                    room_id = %self.room_id,
                    producer_id = %producer_id,
                    "Producer closed by provider"
                );
            }
        }
    }

    /// Send a broadcast to every peer except `except`.
    ///
    /// Delivery is best effort; a slow or closed notify channel never
    /// blocks the room.
    fn broadcast(&self, except: &str, event: RoomBroadcast) {
        for (peer_id, peer) in &self.peers {
            if peer_id == except {
                continue;
            }
            if let Err(e) = peer.notify.try_send(event.clone()) {
                warn!(
                    target: "rc.actor.room",
                    room_id = %self.room_id,
                    peer_id = %peer_id,
                    error = %e,
                    "Dropped room broadcast"
                );
            }
        }
    }

    /// Run a provider call under [`ENGINE_CALL_TIMEOUT`]. A stalled
    /// provider surfaces `Timeout` and frees the mailbox.
    async fn engine_call<T>(
        &self,
        call: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, SignalError> {
        match tokio::time::timeout(ENGINE_CALL_TIMEOUT, call).await {
            Ok(result) => result.map_err(|e| self.map_engine_error(e)),
            Err(_) => {
                warn!(
                    target: "rc.actor.room",
                    room_id = %self.room_id,
                    timeout_secs = ENGINE_CALL_TIMEOUT.as_secs(),
                    "Provider call exceeded deadline"
                );
                Err(SignalError::Timeout)
            }
        }
    }

    fn ensure_worker_live(&self) -> Result<(), SignalError> {
        if self.worker.is_live() {
            Ok(())
        } else {
            Err(SignalError::WorkerFailed(self.room_id.clone()))
        }
    }

    fn map_engine_error(&self, error: EngineError) -> SignalError {
        match error {
            EngineError::WorkerDead(_) => SignalError::WorkerFailed(self.room_id.clone()),
            EngineError::NotFound(what) => SignalError::Engine(format!("provider lost {what}")),
            EngineError::Failure(msg) => SignalError::Engine(msg),
        }
    }

    fn snapshot(&self) -> RoomStateSnapshot {
        let mut peers: Vec<PeerSnapshot> = self
            .peers
            .iter()
            .map(|(peer_id, peer)| PeerSnapshot {
                peer_id: peer_id.clone(),
                transport_count: peer.transports.len(),
                producer_count: peer.producers.len(),
                consumer_count: peer.consumers.len(),
            })
            .collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));

        RoomStateSnapshot {
            room_id: self.room_id.clone(),
            worker_id: self.worker.id(),
            degraded: !self.worker.is_live(),
            peer_count: self.peers.len(),
            peers,
        }
    }

    /// Shut down: close the provider router and drop all state.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            peers = self.peers.len(),
            "RoomActor shutting down"
        );

        if let Err(e) = self
            .engine_call(self.engine.close_router(&self.router_id))
            .await
        {
            warn!(
                target: "rc.actor.room",
                room_id = %self.room_id,
                router_id = %self.router_id,
                error = %e,
                "Failed to close router during shutdown"
            );
        }

        self.peers.clear();
    }
}
