use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::{ConnectionConfig, EncoderPreference};
use crate::errors::SessionError;
use crate::events::{SessionEvent, SignalingMessage};
use crate::ids::ConnectionId;
use crate::transport::{DispatchContext, SignalingTransport};

/// The single bundle a session engine is constructed from.
pub struct EngineDependencies {
    pub config: Arc<ConnectionConfig>,
    pub encoder: EncoderPreference,
    pub transport: Arc<dyn SignalingTransport>,
    /// Where the engine schedules its background work.
    pub scheduler: DispatchContext,
    /// Event-emission contract: the engine posts here, the hub drains it.
    pub events: mpsc::Sender<SessionEvent>,
}

impl std::fmt::Debug for EngineDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDependencies")
            .field("config", &self.config)
            .field("encoder", &self.encoder)
            .field("transport", &self.transport.type_name())
            .finish()
    }
}

/// Owns the real-time connection for one running session.
#[async_trait]
pub trait SessionEngine: Send + Sync {
    fn config(&self) -> &ConnectionConfig;
    fn encoder(&self) -> EncoderPreference;
    fn transport(&self) -> Arc<dyn SignalingTransport>;

    /// Connections currently known to the engine.
    fn connections(&self) -> Vec<ConnectionId>;

    async fn send(&self, message: SignalingMessage) -> Result<(), SessionError>;

    /// Tear down active connections and release the transport. Idempotent.
    fn dispose(&self) -> Result<(), SessionError>;

    fn is_disposed(&self) -> bool;
}

/// Constructs engines from a dependency bundle.
pub trait EngineBuilder: Send + Sync {
    fn build(&self, deps: EngineDependencies) -> Result<Arc<dyn SessionEngine>, SessionError>;
}
