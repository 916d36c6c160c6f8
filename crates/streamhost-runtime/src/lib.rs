//! Session lifecycle: the orchestrator that assembles a session and the hub
//! that fans its events out to handlers.

pub mod event_hub;
pub mod handlers;
pub mod orchestrator;

#[cfg(test)]
mod testing;

pub use event_hub::EventHub;
pub use handlers::LoggingHandler;
pub use orchestrator::{
    OrchestratorConfig, SessionInfo, SessionOrchestrator, SessionState, StartOptions,
};
