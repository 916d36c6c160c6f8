//! Transport registry, built-in signaling transports and the default session
//! engine.

pub mod mock;
pub mod registry;
pub mod session;
pub mod transports;

pub use registry::{create_default_registry, TransportConstructor, TransportRegistry, TransportSource};
pub use session::{SignalingEngine, SignalingEngineBuilder};
pub use transports::{HttpSignaling, MemorySignaling};
