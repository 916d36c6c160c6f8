//! Test doubles for code that drives a session engine.
//!
//! [`MockEngineBuilder`] keeps the event sender from the last build so tests
//! can push events into the hub as if the engine produced them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use streamhost_core::{
    ConnectionConfig, ConnectionId, EncoderPreference, EngineBuilder, EngineDependencies,
    SessionEngine, SessionError, SessionEvent, SignalingMessage, SignalingTransport,
};
use tokio::sync::mpsc;

pub struct MockEngine {
    config: Arc<ConnectionConfig>,
    encoder: EncoderPreference,
    transport: Arc<dyn SignalingTransport>,
    sent: Mutex<Vec<SignalingMessage>>,
    dispose_calls: AtomicUsize,
    disposed: AtomicBool,
    fail_dispose: bool,
}

impl MockEngine {
    pub fn dispose_calls(&self) -> usize {
        self.dispose_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SignalingMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl SessionEngine for MockEngine {
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
        Vec::new()
    }

    async fn send(&self, message: SignalingMessage) -> Result<(), SessionError> {
        self.sent.lock().push(message);
        Ok(())
    }

    fn dispose(&self) -> Result<(), SessionError> {
        let _ = self.dispose_calls.fetch_add(1, Ordering::SeqCst);
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.transport.close();
        if self.fail_dispose {
            return Err(SessionError::EngineTeardown("mock dispose failure".into()));
        }
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockEngineBuilder {
    builds: AtomicUsize,
    events: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    last: Mutex<Option<Arc<MockEngine>>>,
    fail_build: Mutex<Option<SessionError>>,
    fail_dispose: AtomicBool,
}

impl MockEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engines built from now on fail `dispose` with `EngineTeardown`.
    pub fn with_failing_dispose(self) -> Self {
        self.fail_dispose.store(true, Ordering::SeqCst);
        self
    }

    /// The next build returns `err`.
    pub fn with_build_error(self, err: SessionError) -> Self {
        *self.fail_build.lock() = Some(err);
        self
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn last_engine(&self) -> Option<Arc<MockEngine>> {
        self.last.lock().clone()
    }

    /// Event sender handed to the most recent engine.
    pub fn sender(&self) -> Option<mpsc::Sender<SessionEvent>> {
        self.events.lock().clone()
    }

    /// Push an event as the engine would. Returns false if nothing receives it.
    pub async fn emit(&self, event: SessionEvent) -> bool {
        let Some(sender) = self.sender() else {
            return false;
        };
        sender.send(event).await.is_ok()
    }
}

impl EngineBuilder for MockEngineBuilder {
    fn build(&self, deps: EngineDependencies) -> Result<Arc<dyn SessionEngine>, SessionError> {
        if let Some(err) = self.fail_build.lock().take() {
            return Err(err);
        }
        let _ = self.builds.fetch_add(1, Ordering::SeqCst);

        let engine = Arc::new(MockEngine {
            config: deps.config,
            encoder: deps.encoder,
            transport: deps.transport,
            sent: Mutex::new(Vec::new()),
            dispose_calls: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
            fail_dispose: self.fail_dispose.load(Ordering::SeqCst),
        });
        *self.events.lock() = Some(deps.events);
        *self.last.lock() = Some(Arc::clone(&engine));
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use streamhost_core::DispatchContext;

    use super::*;
    use crate::transports::MemorySignaling;

    fn deps(tx: mpsc::Sender<SessionEvent>) -> EngineDependencies {
        let ctx = DispatchContext::current().unwrap();
        EngineDependencies {
            config: Arc::new(ConnectionConfig::default()),
            encoder: EncoderPreference::Hardware,
            transport: Arc::new(MemorySignaling::new("memory://mock", ctx.clone())),
            scheduler: ctx,
            events: tx,
        }
    }

    #[tokio::test]
    async fn emit_reaches_receiver() {
        let builder = MockEngineBuilder::new();
        assert!(!builder.emit(SessionEvent::Started).await);

        let (tx, mut rx) = mpsc::channel(4);
        builder.build(deps(tx)).unwrap();
        assert_eq!(builder.build_count(), 1);
        assert!(builder.emit(SessionEvent::Started).await);
        assert_eq!(rx.recv().await, Some(SessionEvent::Started));
    }

    #[tokio::test]
    async fn failing_dispose_reports_once() {
        let builder = MockEngineBuilder::new().with_failing_dispose();
        let (tx, _rx) = mpsc::channel(4);
        let engine = builder.build(deps(tx)).unwrap();

        assert!(matches!(engine.dispose(), Err(SessionError::EngineTeardown(_))));
        assert!(engine.dispose().is_ok());
        assert!(engine.is_disposed());
        assert!(!engine.transport().is_open());
        assert_eq!(builder.last_engine().unwrap().dispose_calls(), 2);
    }

    #[tokio::test]
    async fn build_error_is_one_shot() {
        let builder = MockEngineBuilder::new().with_build_error(SessionError::Engine("gpu".into()));
        let (tx, _rx) = mpsc::channel(4);
        assert!(builder.build(deps(tx.clone())).is_err());
        assert!(builder.build(deps(tx)).is_ok());
        assert_eq!(builder.build_count(), 1);
    }
}
