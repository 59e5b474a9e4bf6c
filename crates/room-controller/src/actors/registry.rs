//! Room registry actor: singleton per controller instance.
//!
//! Owns the room map. Room creation is serialized through the
//! registry mailbox, so two simultaneous first-joins for the same
//! room id cannot race into duplicate rooms: the second request sees
//! the room stored by the first.
//!
//! The registry also runs the eviction sweep: a room that stays empty
//! for the configured grace period is cancelled and removed. The
//! grace period absorbs everyone-left-then-rejoined churn without
//! tearing the router down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use signal_protocol::{CodecCapability, RtpCapabilities};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::actors::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::actors::room::{RoomActor, RoomActorHandle};
use crate::errors::SignalError;
use crate::media::engine::{MediaEngine, TransportOptions};
use crate::media::worker::WorkerPool;

/// Channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 100;

/// How often the eviction sweep runs.
const EVICTION_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// How long to wait for a room task to finish after cancellation.
const ROOM_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for a room state query during the eviction sweep. A room
/// blocked on a provider call must not wedge the registry; it is
/// skipped, not evicted.
const SWEEP_QUERY_TIMEOUT: Duration = Duration::from_millis(500);

/// Deadline for router creation on the engine.
const ROUTER_CREATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry status for observability endpoints.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    pub rc_id: String,
    pub room_count: usize,
    pub worker_count: usize,
    pub rooms_evicted: u64,
    pub is_draining: bool,
}

/// Messages handled by the `RegistryActor`.
enum RegistryMessage {
    GetOrCreateRoom {
        room_id: String,
        respond_to: oneshot::Sender<Result<RoomActorHandle, SignalError>>,
    },
    GetRoom {
        room_id: String,
        respond_to: oneshot::Sender<Result<RoomActorHandle, SignalError>>,
    },
    GetRouterRtpCapabilities {
        room_id: String,
        respond_to: oneshot::Sender<Result<RtpCapabilities, SignalError>>,
    },
    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },
    Shutdown {
        respond_to: oneshot::Sender<Result<(), SignalError>>,
    },
}

/// Handle to the `RegistryActor`.
///
/// All methods are async and return results via oneshot channels.
#[derive(Clone)]
pub struct RegistryActorHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RegistryActorHandle {
    /// Create a new `RegistryActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    #[must_use]
    pub fn new(
        rc_id: String,
        engine: Arc<dyn MediaEngine>,
        pool: WorkerPool,
        codecs: Vec<CodecCapability>,
        transport_options: TransportOptions,
        eviction_grace: Duration,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RegistryActor::new(
            rc_id,
            receiver,
            cancel_token.clone(),
            engine,
            pool,
            codecs,
            transport_options,
            eviction_grace,
            metrics,
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Get an existing room or create it (worker assignment, router
    /// creation) if unknown.
    pub async fn get_or_create_room(
        &self,
        room_id: String,
    ) -> Result<RoomActorHandle, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetOrCreateRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get an existing room. Fails with `RoomNotFound` if unknown.
    pub async fn get_room(&self, room_id: String) -> Result<RoomActorHandle, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get the RTP capabilities of an existing room's router.
    pub async fn get_router_rtp_capabilities(
        &self,
        room_id: String,
    ) -> Result<RtpCapabilities, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetRouterRtpCapabilities {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get registry status.
    pub async fn get_status(&self) -> Result<RegistryStatus, SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))
    }

    /// Initiate graceful shutdown: stop accepting new rooms and
    /// cancel the actor tree.
    pub async fn shutdown(&self) -> Result<(), SignalError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::Shutdown { respond_to: tx })
            .await
            .map_err(|e| SignalError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SignalError::Internal(format!("response receive failed: {e}")))?
    }

    /// Cancel the registry and all rooms immediately.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Whether the registry has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Create a child token that is cancelled with the registry.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Managed room state.
struct ManagedRoom {
    /// Handle to the room actor.
    handle: RoomActorHandle,
    /// Join handle for monitoring.
    task_handle: JoinHandle<()>,
    /// When the room was last observed empty; cleared on access.
    empty_since: Option<Instant>,
}

/// The `RegistryActor` implementation.
struct RegistryActor {
    /// Controller instance ID.
    rc_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Root cancellation token.
    cancel_token: CancellationToken,
    /// Shared media engine.
    engine: Arc<dyn MediaEngine>,
    /// Media-engine worker pool.
    pool: WorkerPool,
    /// Process-wide codec set for new routers.
    codecs: Vec<CodecCapability>,
    /// Transport settings handed to new rooms.
    transport_options: TransportOptions,
    /// How long an empty room survives before eviction.
    eviction_grace: Duration,
    /// Rooms by ID.
    rooms: HashMap<String, ManagedRoom>,
    /// Whether the registry is accepting new rooms.
    accepting_new: bool,
    /// Shared actor metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RegistryActor {
    #[allow(clippy::too_many_arguments)]
    fn new(
        rc_id: String,
        receiver: mpsc::Receiver<RegistryMessage>,
        cancel_token: CancellationToken,
        engine: Arc<dyn MediaEngine>,
        pool: WorkerPool,
        codecs: Vec<CodecCapability>,
        transport_options: TransportOptions,
        eviction_grace: Duration,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Registry, &rc_id);
        Self {
            rc_id,
            receiver,
            cancel_token,
            engine,
            pool,
            codecs,
            transport_options,
            eviction_grace,
            rooms: HashMap::new(),
            accepting_new: true,
            metrics,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.registry", fields(rc_id = %self.rc_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            workers = self.pool.len(),
            "RegistryActor started"
        );

        let mut sweep = tokio::time::interval(EVICTION_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        "RegistryActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                _ = sweep.tick() => {
                    self.eviction_sweep().await;
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
                                target: "rc.actor.registry",
                                rc_id = %self.rc_id,
                                "RegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RegistryActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::GetOrCreateRoom {
                room_id,
                respond_to,
            } => {
                let result = self.get_or_create_room(room_id).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.get_room(&room_id));
            }

            RegistryMessage::GetRouterRtpCapabilities {
                room_id,
                respond_to,
            } => {
                let result = self
                    .get_room(&room_id)
                    .map(|handle| handle.capabilities().clone());
                let _ = respond_to.send(result);
            }

            RegistryMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            RegistryMessage::Shutdown { respond_to } => {
                let result = self.initiate_shutdown();
                let _ = respond_to.send(result);
            }
        }
    }

    /// Get an existing room or create a new one.
    ///
    /// Runs inside the actor, so concurrent first-joins for the same
    /// room id are serialized and cannot create duplicates.
    async fn get_or_create_room(
        &mut self,
        room_id: String,
    ) -> Result<RoomActorHandle, SignalError> {
        if let Some(managed) = self.rooms.get_mut(&room_id) {
            // Accessed rooms are not eviction candidates.
            managed.empty_since = None;
            return Ok(managed.handle.clone());
        }

        if !self.accepting_new {
            return Err(SignalError::Draining);
        }

        let worker = self.pool.assign();
        let router = match tokio::time::timeout(
            ROUTER_CREATE_TIMEOUT,
            self.engine.create_router(&worker, self.codecs.clone()),
        )
        .await
        {
            Ok(result) => {
                result.map_err(|e| SignalError::Engine(format!("router creation failed: {e}")))?
            }
            Err(_) => {
                warn!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    room_id = %room_id,
                    "Router creation exceeded deadline"
                );
                return Err(SignalError::Timeout);
            }
        };

        let (handle, task_handle) = RoomActor::spawn(
            room_id.clone(),
            router,
            worker.clone(),
            Arc::clone(&self.engine),
            self.transport_options.clone(),
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
        );

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            room_id = %room_id,
            worker_id = worker.id(),
            room_count = self.rooms.len() + 1,
            "Room created"
        );

        self.rooms.insert(
            room_id,
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
                empty_since: None,
            },
        );
        self.metrics.room_created();

        Ok(handle)
    }

    /// Get an existing room without creating it.
    fn get_room(&self, room_id: &str) -> Result<RoomActorHandle, SignalError> {
        self.rooms
            .get(room_id)
            .map(|managed| managed.handle.clone())
            .ok_or_else(|| SignalError::RoomNotFound(room_id.to_string()))
    }

    fn get_status(&self) -> RegistryStatus {
        RegistryStatus {
            rc_id: self.rc_id.clone(),
            room_count: self.rooms.len(),
            worker_count: self.pool.len(),
            rooms_evicted: self.metrics.eviction_count(),
            is_draining: !self.accepting_new,
        }
    }

    /// Walk all rooms: reap dead room tasks immediately, and evict
    /// rooms that have been empty longer than the grace period.
    async fn eviction_sweep(&mut self) {
        let now = Instant::now();
        let mut evict = Vec::new();

        for (room_id, managed) in &mut self.rooms {
            if managed.task_handle.is_finished() {
                warn!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    room_id = %room_id,
                    "Room actor terminated unexpectedly, removing"
                );
                evict.push(room_id.clone());
                continue;
            }

            let peer_count =
                match tokio::time::timeout(SWEEP_QUERY_TIMEOUT, managed.handle.get_state()).await {
                    Ok(Ok(state)) => state.peer_count,
                    Ok(Err(e)) => {
                        warn!(
                            target: "rc.actor.registry",
                            rc_id = %self.rc_id,
                            room_id = %room_id,
                            error = %e,
                            "Room state query failed during sweep, removing"
                        );
                        evict.push(room_id.clone());
                        continue;
                    }
                    // The room may be blocked on a provider call under
                    // its own deadline; skip it this sweep.
                    Err(_) => {
                        debug!(
                            target: "rc.actor.registry",
                            rc_id = %self.rc_id,
                            room_id = %room_id,
                            "Room state query timed out during sweep, skipping"
                        );
                        continue;
                    }
                };

            if peer_count > 0 {
                managed.empty_since = None;
                continue;
            }

            let empty_since = *managed.empty_since.get_or_insert(now);
            if now.duration_since(empty_since) >= self.eviction_grace {
                evict.push(room_id.clone());
            }
        }

        for room_id in evict {
            self.evict_room(&room_id).await;
        }
    }

    /// Cancel a room, await its task, and drop it from the map.
    async fn evict_room(&mut self, room_id: &str) {
        let Some(managed) = self.rooms.remove(room_id) else {
            return;
        };

        managed.handle.cancel();
        match tokio::time::timeout(ROOM_SHUTDOWN_TIMEOUT, managed.task_handle).await {
            Ok(Ok(())) => {
                debug!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    room_id = %room_id,
                    "Room actor completed cleanly"
                );
            }
            Ok(Err(e)) => {
                warn!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    room_id = %room_id,
                    error = ?e,
                    "Room actor task panicked during eviction"
                );
            }
            Err(_) => {
                warn!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    room_id = %room_id,
                    "Room actor eviction timed out"
                );
            }
        }

        self.metrics.room_removed();
        self.metrics.room_evicted();
        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            room_id = %room_id,
            rooms_remaining = self.rooms.len(),
            "Room evicted"
        );
    }

    /// Initiate graceful shutdown.
    fn initiate_shutdown(&mut self) -> Result<(), SignalError> {
        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            room_count = self.rooms.len(),
            "Initiating graceful shutdown"
        );

        // Stop accepting new rooms
        self.accepting_new = false;

        // Cancel the root token (propagates to all rooms)
        self.cancel_token.cancel();

        Ok(())
    }

    /// Perform graceful shutdown.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            room_count = self.rooms.len(),
            "Performing graceful shutdown"
        );

        self.accepting_new = false;

        // Cancel all room actors (already done via parent token, but
        // be explicit)
        for (room_id, managed) in &self.rooms {
            debug!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                room_id = %room_id,
                "Cancelling room actor"
            );
            managed.handle.cancel();
        }

        // Wait for all room tasks to complete
        for (room_id, managed) in self.rooms.drain() {
            match tokio::time::timeout(ROOM_SHUTDOWN_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        room_id = %room_id,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        room_id = %room_id,
                        "Room actor shutdown timed out"
                    );
                }
            }
            self.metrics.room_removed();
        }

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            "Graceful shutdown complete"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::media::inprocess::InProcessEngine;
    use signal_protocol::{RoomBroadcast, TransportRole};

    fn test_transport_options() -> TransportOptions {
        TransportOptions {
            listen_ip: "0.0.0.0".to_string(),
            announced_ip: "127.0.0.1".to_string(),
            rtc_min_port: 40_000,
            rtc_max_port: 49_999,
        }
    }

    fn spawn_registry(workers: usize, eviction_grace: Duration) -> RegistryActorHandle {
        RegistryActorHandle::new(
            "rc-test".to_string(),
            Arc::new(InProcessEngine::new()),
            WorkerPool::new(workers),
            vec![CodecCapability::opus()],
            test_transport_options(),
            eviction_grace,
            ActorMetrics::new(),
        )
    }

    fn notify_channel() -> (
        mpsc::Sender<RoomBroadcast>,
        mpsc::Receiver<RoomBroadcast>,
    ) {
        mpsc::channel(16)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let registry = spawn_registry(1, Duration::from_secs(60));

        let first = registry.get_or_create_room("r1".to_string()).await.unwrap();
        let second = registry.get_or_create_room("r1".to_string()).await.unwrap();
        assert_eq!(first.room_id(), second.room_id());

        let status = registry.get_status().await.unwrap();
        assert_eq!(status.room_count, 1);
    }

    #[tokio::test]
    async fn concurrent_first_joins_create_one_room() {
        let registry = spawn_registry(1, Duration::from_secs(60));

        let a = registry.get_or_create_room("r1".to_string());
        let b = registry.get_or_create_room("r1".to_string());
        let (ra, rb) = tokio::join!(a, b);
        ra.unwrap();
        rb.unwrap();

        let status = registry.get_status().await.unwrap();
        assert_eq!(status.room_count, 1);
    }

    #[tokio::test]
    async fn rooms_are_assigned_workers_round_robin() {
        let registry = spawn_registry(2, Duration::from_secs(60));

        let mut worker_ids = Vec::new();
        for i in 0..4 {
            let room = registry
                .get_or_create_room(format!("room-{i}"))
                .await
                .unwrap();
            let state = room.get_state().await.unwrap();
            worker_ids.push(state.worker_id);
        }
        assert_eq!(worker_ids, vec![0, 1, 0, 1]);
    }

    #[tokio::test]
    async fn unknown_room_capabilities_is_not_found() {
        let registry = spawn_registry(1, Duration::from_secs(60));
        let result = registry
            .get_router_rtp_capabilities("missing".to_string())
            .await;
        assert!(matches!(result, Err(SignalError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn capabilities_reflect_process_codecs() {
        let registry = spawn_registry(1, Duration::from_secs(60));
        registry.get_or_create_room("r1".to_string()).await.unwrap();

        let caps = registry
            .get_router_rtp_capabilities("r1".to_string())
            .await
            .unwrap();
        assert_eq!(caps.codecs.len(), 1);
        assert_eq!(caps.codecs[0].mime_type, "audio/opus");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_room_is_evicted_after_grace_period() {
        let registry = spawn_registry(1, Duration::from_secs(60));
        registry.get_or_create_room("r1".to_string()).await.unwrap();

        // Two sweeps inside the grace period: room survives.
        tokio::time::advance(Duration::from_secs(12)).await;
        tokio::task::yield_now().await;
        let status = registry.get_status().await.unwrap();
        assert_eq!(status.room_count, 1);

        // Past the grace period: room is gone.
        tokio::time::advance(Duration::from_secs(65)).await;
        tokio::task::yield_now().await;
        let status = registry.get_status().await.unwrap();
        assert_eq!(status.room_count, 0);
        assert_eq!(status.rooms_evicted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn occupied_room_is_not_evicted() {
        let registry = spawn_registry(1, Duration::from_secs(60));
        let room = registry.get_or_create_room("r1".to_string()).await.unwrap();

        let (tx, _rx) = notify_channel();
        room.join("a".to_string(), tx).await.unwrap();

        tokio::time::advance(Duration::from_secs(300)).await;
        tokio::task::yield_now().await;

        let status = registry.get_status().await.unwrap();
        assert_eq!(status.room_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejoin_within_grace_period_resets_eviction() {
        let registry = spawn_registry(1, Duration::from_secs(60));
        registry.get_or_create_room("r1".to_string()).await.unwrap();

        // Empty for a while, but accessed again before the deadline.
        tokio::time::advance(Duration::from_secs(40)).await;
        tokio::task::yield_now().await;
        let room = registry.get_or_create_room("r1".to_string()).await.unwrap();
        let (tx, _rx) = notify_channel();
        room.join("a".to_string(), tx).await.unwrap();

        tokio::time::advance(Duration::from_secs(40)).await;
        tokio::task::yield_now().await;
        let status = registry.get_status().await.unwrap();
        assert_eq!(status.room_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_room_does_not_block_the_registry() {
        let engine = Arc::new(InProcessEngine::new());
        let registry = RegistryActorHandle::new(
            "rc-test".to_string(),
            engine.clone(),
            WorkerPool::new(1),
            vec![CodecCapability::opus()],
            test_transport_options(),
            Duration::from_secs(60),
            ActorMetrics::new(),
        );

        let r1 = registry.get_or_create_room("r1".to_string()).await.unwrap();
        let (tx, _rx) = notify_channel();
        r1.join("a".to_string(), tx).await.unwrap();

        // Block r1's actor on a hung provider call.
        engine.set_stalled(true);
        let wedged = r1.clone();
        let _hung = tokio::spawn(async move {
            wedged
                .create_transport("a".to_string(), TransportRole::Send)
                .await
        });
        tokio::task::yield_now().await;

        // A sweep fires while r1 is unresponsive; the sweep must skip
        // it instead of waiting on its mailbox.
        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        // Creating an unrelated room still completes.
        engine.set_stalled(false);
        let result = tokio::time::timeout(
            Duration::from_secs(30),
            registry.get_or_create_room("r2".to_string()),
        )
        .await;
        assert!(
            result.is_ok(),
            "unrelated room creation must not block on a stalled room"
        );
        result.unwrap().unwrap();

        let status = registry.get_status().await.unwrap();
        assert_eq!(status.room_count, 2);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_rooms() {
        let registry = spawn_registry(1, Duration::from_secs(60));
        registry.get_or_create_room("r1".to_string()).await.unwrap();

        registry.shutdown().await.unwrap();
        assert!(registry.is_cancelled());
    }
}
