//! Built-in signaling transports.

pub mod http;
pub mod memory;

pub use http::HttpSignaling;
pub use memory::{MemorySignaling, DEFAULT_INBOUND_CAPACITY};
