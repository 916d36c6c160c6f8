//! Default session engine.
//!
//! Opens the signaling transport and runs a pump on the scheduler that turns
//! inbound signaling messages into session events while tracking which
//! connections are live. Media negotiation itself happens elsewhere; this
//! engine only surfaces what the signaling channel reports.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use streamhost_core::{
    ConnectionConfig, ConnectionId, EncoderPreference, EngineBuilder, EngineDependencies,
    SessionEngine, SessionError, SessionEvent, SignalingMessage, SignalingTransport,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_INBOUND_CAPACITY: usize = 64;

/// Translate one signaling message into session events, updating `known`.
///
/// `connect` and `offer` create unknown connections; `disconnect` deletes known
/// ones. Answers and candidates for unknown connections are dropped.
pub fn translate(message: SignalingMessage, known: &mut BTreeSet<ConnectionId>) -> Vec<SessionEvent> {
    match message {
        SignalingMessage::Connect {
            connection_id,
            polite,
        } => {
            let mut events = Vec::with_capacity(2);
            if known.insert(connection_id.clone()) {
                events.push(SessionEvent::ConnectionCreated {
                    connection_id: connection_id.clone(),
                });
            }
            events.push(SessionEvent::Connected {
                connection_id,
                polite,
            });
            events
        }
        SignalingMessage::Disconnect { connection_id } => {
            if !known.remove(&connection_id) {
                debug!(connection_id = %connection_id, "disconnect for unknown connection");
                return Vec::new();
            }
            vec![
                SessionEvent::Disconnected {
                    connection_id: connection_id.clone(),
                },
                SessionEvent::ConnectionDeleted { connection_id },
            ]
        }
        SignalingMessage::Offer { connection_id, sdp } => {
            let mut events = Vec::with_capacity(2);
            if known.insert(connection_id.clone()) {
                events.push(SessionEvent::ConnectionCreated {
                    connection_id: connection_id.clone(),
                });
            }
            events.push(SessionEvent::OfferReceived { connection_id, sdp });
            events
        }
        SignalingMessage::Answer { connection_id, sdp } => {
            if !known.contains(&connection_id) {
                debug!(connection_id = %connection_id, "answer for unknown connection");
                return Vec::new();
            }
            vec![SessionEvent::AnswerReceived { connection_id, sdp }]
        }
        SignalingMessage::Candidate {
            connection_id,
            candidate,
            sdp_mid,
            sdp_m_line_index,
        } => {
            if !known.contains(&connection_id) {
                debug!(connection_id = %connection_id, "candidate for unknown connection");
                return Vec::new();
            }
            vec![SessionEvent::CandidateReceived {
                connection_id,
                candidate,
                sdp_mid,
                sdp_m_line_index,
            }]
        }
    }
}

pub struct SignalingEngine {
    config: Arc<ConnectionConfig>,
    encoder: EncoderPreference,
    transport: Arc<dyn SignalingTransport>,
    connections: Arc<Mutex<BTreeSet<ConnectionId>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    disposed: AtomicBool,
}

impl SignalingEngine {
    /// Open the transport and start the pump on the dependency scheduler.
    pub fn start(deps: EngineDependencies, inbound_capacity: usize) -> Result<Self, SessionError> {
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_capacity.max(1));
        deps.transport.open(inbound_tx)?;

        let connections = Arc::new(Mutex::new(BTreeSet::new()));
        let cancel = CancellationToken::new();
        let pump = deps.scheduler.spawn(pump(
            inbound_rx,
            deps.events,
            Arc::clone(&connections),
            cancel.clone(),
        ));

        info!(
            transport = %deps.transport.type_name(),
            endpoint = %deps.transport.endpoint_url(),
            encoder = %deps.encoder,
            ice_servers = deps.config.ice_servers.len(),
            "signaling engine started"
        );

        Ok(Self {
            config: deps.config,
            encoder: deps.encoder,
            transport: deps.transport,
            connections,
            pump: Mutex::new(Some(pump)),
            cancel,
            disposed: AtomicBool::new(false),
        })
    }
}

async fn pump(
    mut inbound: mpsc::Receiver<SignalingMessage>,
    events: mpsc::Sender<SessionEvent>,
    connections: Arc<Mutex<BTreeSet<ConnectionId>>>,
    cancel: CancellationToken,
) {
    if !emit(&events, &cancel, SessionEvent::Started).await {
        return;
    }

    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => break,
            msg = inbound.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let translated = {
            let mut known = connections.lock();
            translate(message, &mut known)
        };
        for event in translated {
            if !emit(&events, &cancel, event).await {
                return;
            }
        }
    }
    debug!("engine pump stopped");
}

/// Returns false once the engine is cancelled or nobody drains the queue.
async fn emit(
    events: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
    event: SessionEvent,
) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

#[async_trait]
impl SessionEngine for SignalingEngine {
    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn encoder(&self) -> EncoderPreference {
        self.encoder
    }

    fn transport(&self) -> Arc<dyn SignalingTransport> {
        Arc::clone(&self.transport)
    }

    fn connections(&self) -> Vec<ConnectionId> {
        self.connections.lock().iter().cloned().collect()
    }

    async fn send(&self, message: SignalingMessage) -> Result<(), SessionError> {
        if self.is_disposed() {
            return Err(SessionError::Engine("engine disposed".into()));
        }
        self.transport.send(message).await
    }

    fn dispose(&self) -> Result<(), SessionError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cancel.cancel();
        if let Some(handle) = self.pump.lock().take() {
            handle.abort();
        }
        self.connections.lock().clear();

        self.transport.close().map_err(|e| {
            warn!(error = %e, "transport close failed during dispose");
            SessionError::EngineTeardown(e.to_string())
        })?;
        debug!("signaling engine disposed");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for SignalingEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Builds [`SignalingEngine`]s.
#[derive(Clone, Debug)]
pub struct SignalingEngineBuilder {
    inbound_capacity: usize,
}

impl SignalingEngineBuilder {
    pub fn new() -> Self {
        Self {
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }

    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }
}

impl Default for SignalingEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder for SignalingEngineBuilder {
    fn build(&self, deps: EngineDependencies) -> Result<Arc<dyn SessionEngine>, SessionError> {
        Ok(Arc::new(SignalingEngine::start(deps, self.inbound_capacity)?))
    }
}
