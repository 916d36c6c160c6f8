//! In-process signaling transport.
//!
//! Nothing leaves the process: inbound messages are queued with
//! [`MemorySignaling::inject`] and outbound ones are captured for
//! [`MemorySignaling::take_sent`]. Used for local runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use streamhost_core::{
    DispatchContext, MessageSink, SessionError, SignalingMessage, SignalingTransport,
    TransportParams,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Inbound messages that may be queued ahead of the session reading them.
pub const DEFAULT_INBOUND_CAPACITY: usize = 256;

pub struct MemorySignaling {
    endpoint_url: String,
    context: DispatchContext,
    inbound_tx: mpsc::Sender<SignalingMessage>,
    inbound_rx: Mutex<Option<mpsc::Receiver<SignalingMessage>>>,
    sent: Mutex<Vec<SignalingMessage>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    open: AtomicBool,
    closed: AtomicBool,
}

impl MemorySignaling {
    pub const TYPE_NAME: &'static str = "memory";

    pub fn new(endpoint_url: impl Into<String>, context: DispatchContext) -> Self {
        Self::with_capacity(endpoint_url, context, DEFAULT_INBOUND_CAPACITY)
    }

    /// `capacity` is clamped to at least one.
    pub fn with_capacity(
        endpoint_url: impl Into<String>,
        context: DispatchContext,
        capacity: usize,
    ) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));
        Self {
            endpoint_url: endpoint_url.into(),
            context,
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            sent: Mutex::new(Vec::new()),
            forwarder: Mutex::new(None),
            cancel: CancellationToken::new(),
            open: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_params(params: TransportParams) -> Self {
        Self::new(params.endpoint_url, params.context)
    }

    /// Queue an inbound message. Messages injected before `open` are delivered
    /// once the transport opens; after `close` they are dropped.
    ///
    /// Returns `false` if the message was dropped, either because the
    /// transport is closed or because the inbound queue is full.
    pub fn inject(&self, message: SignalingMessage) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            trace!(kind = message.kind(), "memory transport closed, dropping message");
            return false;
        }
        match self.inbound_tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(
                    kind = message.kind(),
                    endpoint = %self.endpoint_url,
                    "memory transport inbound queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                trace!(kind = message.kind(), "memory transport reader gone, dropping message");
                false
            }
        }
    }

    /// Drain everything sent through this transport so far.
    pub fn take_sent(&self) -> Vec<SignalingMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingTransport for MemorySignaling {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    fn open(&self, sink: MessageSink) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("memory transport already closed".into()));
        }
        let Some(mut inbound) = self.inbound_rx.lock().take() else {
            return Err(SessionError::Transport("memory transport already open".into()));
        };

        let cancel = self.cancel.clone();
        let handle = self.context.spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    msg = inbound.recv() => match msg {
                        Some(msg) => {
                            if sink.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });
        *self.forwarder.lock() = Some(handle);
        self.open.store(true, Ordering::SeqCst);
        debug!(endpoint = %self.endpoint_url, "memory transport opened");
        Ok(())
    }

    async fn send(&self, message: SignalingMessage) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("memory transport closed".into()));
        }
        self.sent.lock().push(message);
        Ok(())
    }

    fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.open.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        if let Some(handle) = self.forwarder.lock().take() {
            handle.abort();
        }
        debug!(endpoint = %self.endpoint_url, "memory transport closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for MemorySignaling {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
