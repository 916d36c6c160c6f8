pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod handler;
pub mod ids;
pub mod transport;

pub use config::{ConnectionConfig, Credential, EncoderPreference, IceServer, SignalingParams};
pub use engine::{EngineBuilder, EngineDependencies, SessionEngine};
pub use errors::{HandlerError, SessionError};
pub use events::{SessionEvent, SignalingMessage};
pub use handler::SessionHandler;
pub use ids::{ConnectionId, SessionId, SubscriptionId};
pub use transport::{DispatchContext, MessageSink, SignalingTransport, TransportParams};
