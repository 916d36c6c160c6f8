//! Fan-out of engine events to registered handlers.
//!
//! One consumer task drains the engine's bounded event queue and delivers each
//! event to every subscriber in subscription order. A failing or panicking
//! handler is reported on the error channel and the pass continues.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use streamhost_core::{
    DispatchContext, SessionEngine, SessionError, SessionEvent, SessionHandler, SubscriptionId,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const ERROR_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn SessionHandler>,
}

pub struct EventHub {
    engine: Arc<dyn SessionEngine>,
    subscribers: Arc<RwLock<Vec<Subscription>>>,
    /// `true` once closed. Held for the duration of each dispatch pass.
    gate: Arc<Mutex<bool>>,
    errors: broadcast::Sender<SessionError>,
    events: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl EventHub {
    pub fn new(engine: Arc<dyn SessionEngine>, events: mpsc::Receiver<SessionEvent>) -> Self {
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            engine,
            subscribers: Arc::new(RwLock::new(Vec::new())),
            gate: Arc::new(Mutex::new(false)),
            errors,
            events: Mutex::new(Some(events)),
            consumer: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn engine(&self) -> Arc<dyn SessionEngine> {
        Arc::clone(&self.engine)
    }

    /// Add a handler at the end of the dispatch order.
    pub fn subscribe(&self, handler: Arc<dyn SessionHandler>) -> SubscriptionId {
        let id = SubscriptionId::new();
        debug!(handler = handler.name(), subscription = %id, "handler subscribed");
        self.subscribers.write().push(Subscription {
            id: id.clone(),
            handler,
        });
        id
    }

    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| &s.id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Errors raised by handlers during dispatch.
    pub fn dispatch_errors(&self) -> broadcast::Receiver<SessionError> {
        self.errors.subscribe()
    }

    /// Start the consumer task on `context`. Only the first call succeeds.
    pub fn run(&self, context: &DispatchContext) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Engine("event hub closed".into()));
        }
        let Some(mut events) = self.events.lock().take() else {
            return Err(SessionError::Engine("event hub already running".into()));
        };

        let subscribers = Arc::clone(&self.subscribers);
        let gate = Arc::clone(&self.gate);
        let errors = self.errors.clone();
        let cancel = self.cancel.clone();

        let handle = context.spawn(async move {
            loop {
                let event = tokio::select! {
                    () = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                if !dispatch_pass(&event, &gate, &subscribers, &errors) {
                    break;
                }
            }
            debug!("event hub consumer stopped");
        });
        *self.consumer.lock() = Some(handle);
        Ok(())
    }

    /// Stop delivery. Once this returns no handler sees another event.
    ///
    /// Waits for a pass that is already running, so it must not be called
    /// from inside a handler.
    pub fn close(&self) {
        {
            let mut closed = self.gate.lock();
            if *closed {
                return;
            }
            *closed = true;
        }
        self.cancel.cancel();
        if let Some(handle) = self.consumer.lock().take() {
            handle.abort();
        }
        debug!("event hub closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.gate.lock()
    }
}

impl Drop for EventHub {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Deliver one event to a snapshot of the subscribers. Returns false if the hub
/// has been closed.
fn dispatch_pass(
    event: &SessionEvent,
    gate: &Mutex<bool>,
    subscribers: &RwLock<Vec<Subscription>>,
    errors: &broadcast::Sender<SessionError>,
) -> bool {
    let closed = gate.lock();
    if *closed {
        return false;
    }
    let snapshot: Vec<Subscription> = subscribers.read().clone();
    for subscription in &snapshot {
        if let Some(err) = deliver(event, subscription.handler.as_ref()) {
            error!(
                handler = subscription.handler.name(),
                event = event.name(),
                error = %err,
                "handler failed"
            );
            let _ = errors.send(err);
        }
    }
    true
}

fn deliver(event: &SessionEvent, handler: &dyn SessionHandler) -> Option<SessionError> {
    let reason = match catch_unwind(AssertUnwindSafe(|| handler.on_event(event))) {
        Ok(Ok(())) => return None,
        Ok(Err(e)) => e.to_string(),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            format!("panicked: {message}")
        }
    };
    Some(SessionError::HandlerDispatch {
        handler: handler.name().to_string(),
        event: event.name().to_string(),
        reason,
    })
}
