use std::sync::Arc;

use parking_lot::RwLock;
use streamhost_core::{HandlerError, SessionEngine, SessionEvent, SessionHandler};
use tracing::info;

/// Logs every session event. Installed by the binary when nothing else is.
#[derive(Default)]
pub struct LoggingHandler {
    engine: RwLock<Option<Arc<dyn SessionEngine>>>,
}

impl LoggingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> Option<Arc<dyn SessionEngine>> {
        self.engine.read().clone()
    }
}

impl SessionHandler for LoggingHandler {
    fn name(&self) -> &str {
        "logging"
    }

    fn bind_engine(&self, engine: Arc<dyn SessionEngine>) {
        info!(
            transport = %engine.transport().type_name(),
            encoder = %engine.encoder(),
            "logging handler bound"
        );
        *self.engine.write() = Some(engine);
    }

    fn on_event(&self, event: &SessionEvent) -> Result<(), HandlerError> {
        match event.connection_id() {
            Some(connection_id) => info!(
                event = event.name(),
                connection_id = %connection_id,
                "session event"
            ),
            None => info!(event = event.name(), "session event"),
        }
        Ok(())
    }
}
