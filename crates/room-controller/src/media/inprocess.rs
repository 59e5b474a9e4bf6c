//! In-process media engine.
//!
//! A self-contained [`MediaEngine`] implementation that fabricates
//! plausible connection parameters and tracks object lifecycles in
//! memory. It performs no networking. It backs local development and
//! every actor-level test, and it honors the full provider contract:
//! consumers start paused, transport closes cascade to producers and
//! consumers, and lifecycle events are pushed on the router's event
//! channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use signal_protocol::rtp::{
    DtlsFingerprint, DtlsParameters, DtlsRole, IceCandidate, IceParameters, TransportProtocol,
};
use signal_protocol::{
    CodecCapability, ConsumerParams, MediaKind, RtpCapabilities, RtpParameters, TransportParams,
};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::media::engine::{
    EngineError, EngineEvent, MediaEngine, RouterCreated, TransportOptions,
};
use crate::media::worker::WorkerHandle;

const EVENT_CHANNEL_SIZE: usize = 64;

struct RouterState {
    capabilities: RtpCapabilities,
    events: mpsc::Sender<EngineEvent>,
}

struct TransportState {
    router_id: String,
    connected: bool,
}

struct ProducerState {
    router_id: String,
    transport_id: String,
    kind: MediaKind,
    rtp_parameters: RtpParameters,
}

struct ConsumerState {
    transport_id: String,
    producer_id: String,
    paused: bool,
}

#[derive(Default)]
struct EngineState {
    routers: HashMap<String, RouterState>,
    transports: HashMap<String, TransportState>,
    producers: HashMap<String, ProducerState>,
    consumers: HashMap<String, ConsumerState>,
}

/// In-memory media engine.
pub struct InProcessEngine {
    state: Mutex<EngineState>,
    next_id: AtomicU64,
    stalled: Arc<AtomicBool>,
}

impl Default for InProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            next_id: AtomicU64::new(1),
            stalled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// When stalled, every provider call hangs forever. Used to
    /// exercise request deadlines.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    async fn stall_point(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{n}")
    }

    fn fabricate_ice() -> IceParameters {
        IceParameters {
            username_fragment: Uuid::new_v4().simple().to_string(),
            password: Uuid::new_v4().simple().to_string(),
            ice_lite: true,
        }
    }

    fn fabricate_dtls() -> DtlsParameters {
        let value = Uuid::new_v4()
            .as_bytes()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");
        DtlsParameters {
            role: DtlsRole::Auto,
            fingerprints: vec![DtlsFingerprint {
                algorithm: "sha-256".to_string(),
                value,
            }],
        }
    }
}

#[async_trait]
impl MediaEngine for InProcessEngine {
    async fn create_router(
        &self,
        worker: &WorkerHandle,
        codecs: Vec<CodecCapability>,
    ) -> Result<RouterCreated, EngineError> {
        self.stall_point().await;
        if !worker.is_live() {
            return Err(EngineError::WorkerDead(worker.id()));
        }

        let router_id = self.next_id("router");
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let capabilities = RtpCapabilities { codecs };

        let mut state = self.state.lock().await;
        state.routers.insert(
            router_id.clone(),
            RouterState {
                capabilities: capabilities.clone(),
                events: events_tx,
            },
        );

        debug!(target: "rc.media", router_id = %router_id, worker_id = worker.id(), "Router created");

        Ok(RouterCreated {
            router_id,
            capabilities,
            events: events_rx,
        })
    }

    async fn create_transport(
        &self,
        router_id: &str,
        options: &TransportOptions,
    ) -> Result<TransportParams, EngineError> {
        self.stall_point().await;
        let mut state = self.state.lock().await;
        if !state.routers.contains_key(router_id) {
            return Err(EngineError::NotFound(format!("router {router_id}")));
        }

        let transport_id = self.next_id("transport");
        state.transports.insert(
            transport_id.clone(),
            TransportState {
                router_id: router_id.to_string(),
                connected: false,
            },
        );

        let port_span = u64::from(options.rtc_max_port - options.rtc_min_port) + 1;
        let offset = self.next_id.load(Ordering::SeqCst) % port_span;
        let port = options.rtc_min_port + u16::try_from(offset).unwrap_or(0);

        Ok(TransportParams {
            id: transport_id,
            ice_parameters: Self::fabricate_ice(),
            ice_candidates: vec![IceCandidate {
                foundation: "udpcandidate".to_string(),
                priority: 1_076_302_079,
                ip: options.announced_ip.clone(),
                protocol: TransportProtocol::Udp,
                port,
                candidate_type: "host".to_string(),
            }],
            dtls_parameters: Self::fabricate_dtls(),
        })
    }

    async fn connect_transport(
        &self,
        transport_id: &str,
        _dtls_parameters: DtlsParameters,
    ) -> Result<(), EngineError> {
        self.stall_point().await;
        let mut state = self.state.lock().await;
        let transport = state
            .transports
            .get_mut(transport_id)
            .ok_or_else(|| EngineError::NotFound(format!("transport {transport_id}")))?;
        transport.connected = true;
        Ok(())
    }

    async fn produce(
        &self,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<String, EngineError> {
        self.stall_point().await;
        let mut state = self.state.lock().await;
        let router_id = state
            .transports
            .get(transport_id)
            .map(|t| t.router_id.clone())
            .ok_or_else(|| EngineError::NotFound(format!("transport {transport_id}")))?;

        let producer_id = self.next_id("producer");
        state.producers.insert(
            producer_id.clone(),
            ProducerState {
                router_id,
                transport_id: transport_id.to_string(),
                kind,
                rtp_parameters,
            },
        );
        Ok(producer_id)
    }

    async fn can_consume(
        &self,
        router_id: &str,
        producer_id: &str,
        capabilities: &RtpCapabilities,
    ) -> Result<bool, EngineError> {
        self.stall_point().await;
        let state = self.state.lock().await;
        let producer = state
            .producers
            .get(producer_id)
            .ok_or_else(|| EngineError::NotFound(format!("producer {producer_id}")))?;
        if producer.router_id != router_id {
            return Err(EngineError::NotFound(format!(
                "producer {producer_id} under router {router_id}"
            )));
        }
        Ok(capabilities.can_consume(&producer.rtp_parameters))
    }

    async fn consume(
        &self,
        transport_id: &str,
        producer_id: &str,
        capabilities: &RtpCapabilities,
        paused: bool,
    ) -> Result<ConsumerParams, EngineError> {
        self.stall_point().await;
        let mut state = self.state.lock().await;
        if !state.transports.contains_key(transport_id) {
            return Err(EngineError::NotFound(format!("transport {transport_id}")));
        }
        let (kind, rtp_parameters) = {
            let producer = state
                .producers
                .get(producer_id)
                .ok_or_else(|| EngineError::NotFound(format!("producer {producer_id}")))?;
            if !capabilities.can_consume(&producer.rtp_parameters) {
                return Err(EngineError::Failure(format!(
                    "capabilities cannot consume producer {producer_id}"
                )));
            }
            (producer.kind, producer.rtp_parameters.clone())
        };

        let consumer_id = self.next_id("consumer");
        state.consumers.insert(
            consumer_id.clone(),
            ConsumerState {
                transport_id: transport_id.to_string(),
                producer_id: producer_id.to_string(),
                paused,
            },
        );

        Ok(ConsumerParams {
            id: consumer_id,
            producer_id: producer_id.to_string(),
            kind,
            rtp_parameters,
        })
    }

    async fn resume_consumer(&self, consumer_id: &str) -> Result<(), EngineError> {
        self.stall_point().await;
        let mut state = self.state.lock().await;
        match state.consumers.get_mut(consumer_id) {
            Some(consumer) => {
                consumer.paused = false;
            }
            None => {
                // Consumer already closed; resume is a no-op.
                debug!(target: "rc.media", consumer_id = %consumer_id, "Resume on closed consumer ignored");
            }
        }
        Ok(())
    }

    async fn close_transport(&self, transport_id: &str) -> Result<(), EngineError> {
        self.stall_point().await;
        let mut state = self.state.lock().await;
        let Some(transport) = state.transports.remove(transport_id) else {
            // Already closed.
            return Ok(());
        };

        let closed_producers: Vec<String> = state
            .producers
            .iter()
            .filter(|(_, p)| p.transport_id == transport_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &closed_producers {
            state.producers.remove(id);
        }

        state
            .consumers
            .retain(|_, c| c.transport_id != transport_id && !closed_producers.contains(&c.producer_id));

        if let Some(router) = state.routers.get(&transport.router_id) {
            for producer_id in closed_producers {
                let _ = router
                    .events
                    .try_send(EngineEvent::ProducerClosed { producer_id });
            }
            let _ = router.events.try_send(EngineEvent::TransportClosed {
                transport_id: transport_id.to_string(),
            });
        }

        Ok(())
    }

    async fn close_router(&self, router_id: &str) -> Result<(), EngineError> {
        self.stall_point().await;
        let mut state = self.state.lock().await;
        state.routers.remove(router_id);
        let transport_ids: Vec<String> = state
            .transports
            .iter()
            .filter(|(_, t)| t.router_id == router_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &transport_ids {
            state.transports.remove(id);
        }
        state.producers.retain(|_, p| p.router_id != router_id);
        state
            .consumers
            .retain(|_, c| !transport_ids.contains(&c.transport_id));
        Ok(())
    }
}
