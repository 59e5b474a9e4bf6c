//! Signaling dispatcher actor: one per connection.
//!
//! Sits between a signaling connection (whatever carries it: a
//! WebSocket, a test harness) and the room layer. Each request is
//! resolved independently under a per-request deadline, so a stalled
//! provider call turns into an explicit timeout error instead of a
//! silently hung acknowledgment.
//!
//! The dispatcher remembers the room its connection last joined and
//! removes the peer from that room when the connection goes away.

use std::sync::Arc;
use std::time::Duration;

use signal_protocol::{RoomBroadcast, SignalingRequest, SignalingResponse};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::actors::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::actors::registry::RegistryActorHandle;
use crate::actors::room::RoomActorHandle;
use crate::errors::SignalError;

/// Channel buffer size for dispatcher mailboxes.
const DISPATCHER_CHANNEL_BUFFER: usize = 32;

/// Messages handled by the `DispatcherActor`.
enum DispatcherMessage {
    Request {
        request: SignalingRequest,
        respond_to: oneshot::Sender<Result<SignalingResponse, SignalError>>,
    },
    Disconnect {
        respond_to: oneshot::Sender<()>,
    },
}

/// Handle to a `DispatcherActor`.
#[derive(Clone)]
pub struct DispatcherActorHandle {
    sender: mpsc::Sender<DispatcherMessage>,
    cancel_token: CancellationToken,
    connection_id: String,
}

impl DispatcherActorHandle {
    /// Get the connection ID (doubles as the peer ID in rooms).
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Submit a signaling request and await its acknowledgment.
    pub async fn request(
        &self,
        request: SignalingRequest,
    ) -> Result<SignalingResponse, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(DispatcherMessage::Request {
                request,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Signal that the connection closed. Removes the peer from the
    /// room it last joined, then stops the actor.
    pub async fn disconnect(&self) -> Result<(), SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(DispatcherMessage::Disconnect { respond_to: tx })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the dispatcher without the disconnect handshake.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

/// The `DispatcherActor` implementation.
pub struct DispatcherActor {
    /// Connection ID; also the peer ID inside rooms.
    connection_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<DispatcherMessage>,
    /// Cancellation token (child of the service's token).
    cancel_token: CancellationToken,
    /// Registry handle for room lookup and creation.
    registry: RegistryActorHandle,
    /// Outbound channel for room broadcasts to this connection.
    outbound: mpsc::Sender<RoomBroadcast>,
    /// Per-request deadline.
    request_timeout: Duration,
    /// The room this connection last joined, for disconnect cleanup.
    joined: Option<RoomActorHandle>,
    /// Shared actor metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl DispatcherActor {
    /// Spawn a new dispatcher actor for one signaling connection.
    ///
    /// `outbound` receives every room broadcast addressed to this
    /// connection once it has joined a room.
    pub fn spawn(
        connection_id: String,
        registry: RegistryActorHandle,
        outbound: mpsc::Sender<RoomBroadcast>,
        request_timeout: Duration,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (DispatcherActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(DISPATCHER_CHANNEL_BUFFER);

        metrics.dispatcher_created();
        let actor = Self {
            connection_id: connection_id.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            registry,
            outbound,
            request_timeout,
            joined: None,
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Dispatcher, &connection_id),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = DispatcherActorHandle {
            sender,
            cancel_token,
            connection_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.dispatcher", fields(connection_id = %self.connection_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.dispatcher",
            connection_id = %self.connection_id,
            "DispatcherActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.dispatcher",
                        connection_id = %self.connection_id,
                        "DispatcherActor received cancellation signal"
                    );
                    self.leave_room().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(DispatcherMessage::Request { request, respond_to }) => {
                            self.mailbox.record_enqueue();
                            let result = self.handle_request(request).await;
                            let _ = respond_to.send(result);
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        Some(DispatcherMessage::Disconnect { respond_to }) => {
                            self.leave_room().await;
                            let _ = respond_to.send(());
                            break;
                        }
                        None => {
                            // Connection dropped its handle without the
                            // disconnect handshake; clean up anyway.
                            debug!(
                                target: "rc.actor.dispatcher",
                                connection_id = %self.connection_id,
                                "DispatcherActor channel closed, cleaning up"
                            );
                            self.leave_room().await;
                            break;
                        }
                    }
                }
            }
        }

        self.metrics.dispatcher_closed();
        info!(
            target: "rc.actor.dispatcher",
            connection_id = %self.connection_id,
            messages_processed = self.mailbox.messages_processed(),
            "DispatcherActor stopped"
        );
    }

    /// Resolve one request under the per-request deadline.
    async fn handle_request(
        &mut self,
        request: SignalingRequest,
    ) -> Result<SignalingResponse, SignalError> {
        let timeout = self.request_timeout;
        match tokio::time::timeout(timeout, self.dispatch(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    target: "rc.actor.dispatcher",
                    connection_id = %self.connection_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Request exceeded deadline"
                );
                Err(SignalError::Timeout)
            }
        }
    }

    async fn dispatch(
        &mut self,
        request: SignalingRequest,
    ) -> Result<SignalingResponse, SignalError> {
        match request {
            SignalingRequest::GetRouterRtpCapabilities { room_id } => {
                let capabilities = self.registry.get_router_rtp_capabilities(room_id).await?;
                Ok(SignalingResponse::RouterRtpCapabilities(capabilities))
            }

            SignalingRequest::Join { room_id } => {
                // Joining a new room implicitly leaves the previous
                // one; the last-joined room is the one cleaned up on
                // disconnect.
                if let Some(previous) = self.joined.take() {
                    if previous.room_id() != room_id {
                        previous
                            .remove_peer(self.connection_id.clone())
                            .await
                            .ok();
                    } else {
                        self.joined = Some(previous);
                    }
                }

                let room = self.registry.get_or_create_room(room_id).await?;
                let result = room
                    .join(self.connection_id.clone(), self.outbound.clone())
                    .await?;
                self.joined = Some(room);
                Ok(SignalingResponse::Joined {
                    peer_ids: result.peer_ids,
                })
            }

            SignalingRequest::CreateWebRtcTransport { room_id, direction } => {
                let room = self.room(&room_id).await?;
                let params = room
                    .create_transport(self.connection_id.clone(), direction)
                    .await?;
                Ok(SignalingResponse::TransportCreated(params))
            }

            SignalingRequest::ConnectWebRtcTransport {
                room_id,
                transport_id,
                dtls_parameters,
            } => {
                let room = self.room(&room_id).await?;
                room.connect_transport(self.connection_id.clone(), transport_id, dtls_parameters)
                    .await?;
                Ok(SignalingResponse::TransportConnected)
            }

            SignalingRequest::Produce {
                room_id,
                transport_id,
                kind,
                rtp_parameters,
            } => {
                let room = self.room(&room_id).await?;
                let id = room
                    .produce(
                        self.connection_id.clone(),
                        transport_id,
                        kind,
                        rtp_parameters,
                    )
                    .await?;
                Ok(SignalingResponse::Produced { id })
            }

            SignalingRequest::Consume {
                room_id,
                producer_peer_id,
                rtp_capabilities,
            } => {
                let room = self.room(&room_id).await?;
                let params = room
                    .consume(
                        self.connection_id.clone(),
                        producer_peer_id,
                        rtp_capabilities,
                    )
                    .await?;
                Ok(SignalingResponse::Consumed(params))
            }

            SignalingRequest::Resume {
                room_id,
                consumer_id,
            } => {
                let room = self.room(&room_id).await?;
                room.resume_consumer(self.connection_id.clone(), consumer_id)
                    .await?;
                Ok(SignalingResponse::Resumed)
            }
        }
    }

    /// Resolve the room for a non-join request: the joined room if
    /// the id matches, otherwise a registry lookup of an existing
    /// room.
    async fn room(&self, room_id: &str) -> Result<RoomActorHandle, SignalError> {
        if let Some(room) = &self.joined {
            if room.room_id() == room_id {
                return Ok(room.clone());
            }
        }
        self.registry.get_room(room_id.to_string()).await
    }

    /// Remove this connection's peer from the room it last joined.
    async fn leave_room(&mut self) {
        if let Some(room) = self.joined.take() {
            if let Err(e) = room.remove_peer(self.connection_id.clone()).await {
                warn!(
                    target: "rc.actor.dispatcher",
                    connection_id = %self.connection_id,
                    room_id = %room.room_id(),
                    error = %e,
                    "Failed to remove peer during disconnect"
                );
            }
        }
    }
}
