use std::sync::Arc;

use crate::engine::SessionEngine;
use crate::errors::HandlerError;
use crate::events::SessionEvent;

/// A consumer of session events.
///
/// Handlers are owned by whoever registered them; the orchestrator only holds
/// references. `bind_engine` runs on whichever task calls `start`, before any
/// event is dispatched. `on_event` always runs on the session's single dispatch
/// task, so events reach a handler one at a time and in order.
pub trait SessionHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Called once per `start` with the freshly built engine.
    fn bind_engine(&self, engine: Arc<dyn SessionEngine>);

    fn on_event(&self, event: &SessionEvent) -> Result<(), HandlerError>;
}
