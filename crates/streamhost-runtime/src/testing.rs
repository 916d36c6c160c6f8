//! Shared fixtures for the runtime tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use streamhost_core::{
    ConnectionConfig, DispatchContext, EncoderPreference, EngineBuilder, EngineDependencies,
    HandlerError, SessionEngine, SessionEvent, SessionHandler,
};
use streamhost_engine::mock::MockEngineBuilder;
use streamhost_engine::MemorySignaling;
use tokio::sync::mpsc;

/// `(handler name, event name)` in delivery order, shared across handlers.
pub type EventLog = Arc<Mutex<Vec<(String, String)>>>;

pub struct RecordingHandler {
    name: String,
    log: EventLog,
    fail_on: Option<&'static str>,
    panic_on: Option<&'static str>,
    bound: Mutex<Vec<Arc<dyn SessionEngine>>>,
}

impl RecordingHandler {
    pub fn shared_log() -> EventLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn build(
        name: &str,
        log: &EventLog,
        fail_on: Option<&'static str>,
        panic_on: Option<&'static str>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: Arc::clone(log),
            fail_on,
            panic_on,
            bound: Mutex::new(Vec::new()),
        })
    }

    pub fn new(name: &str, log: &EventLog) -> Arc<Self> {
        Self::build(name, log, None, None)
    }

    pub fn failing_on(name: &str, log: &EventLog, event: &'static str) -> Arc<Self> {
        Self::build(name, log, Some(event), None)
    }

    pub fn panicking_on(name: &str, log: &EventLog, event: &'static str) -> Arc<Self> {
        Self::build(name, log, None, Some(event))
    }

    pub fn bind_count(&self) -> usize {
        self.bound.lock().len()
    }
}

impl SessionHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind_engine(&self, engine: Arc<dyn SessionEngine>) {
        self.bound.lock().push(engine);
    }

    fn on_event(&self, event: &SessionEvent) -> Result<(), HandlerError> {
        if self.panic_on == Some(event.name()) {
            panic!("{} exploded on {}", self.name, event.name());
        }
        if self.fail_on == Some(event.name()) {
            return Err(HandlerError::new("refused"));
        }
        self.log
            .lock()
            .push((self.name.clone(), event.name().to_string()));
        Ok(())
    }
}

/// A mock engine over an in-memory transport. Requires a runtime.
pub fn mock_engine() -> Arc<dyn SessionEngine> {
    let ctx = DispatchContext::current().expect("tokio runtime");
    let (events, _rx) = mpsc::channel(1);
    MockEngineBuilder::new()
        .build(EngineDependencies {
            config: Arc::new(ConnectionConfig::default()),
            encoder: EncoderPreference::Hardware,
            transport: Arc::new(MemorySignaling::new("memory://test", ctx.clone())),
            scheduler: ctx,
            events,
        })
        .expect("mock build")
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_for(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
