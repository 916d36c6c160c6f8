//! Signaling transport boundary.
//!
//! The orchestrator only knows transports through [`SignalingTransport`] and
//! the construction contract carried by [`TransportParams`]. Any conforming
//! implementation can be registered without orchestrator changes.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::SessionError;
use crate::events::SignalingMessage;

/// Bounded sink a transport delivers inbound signaling messages into.
pub type MessageSink = mpsc::Sender<SignalingMessage>;

/// Execution context captured when a session starts.
///
/// Transports and engines spawn their background work here so that every
/// callback lands on the runtime the owner started the session from.
#[derive(Clone, Debug)]
pub struct DispatchContext {
    handle: Handle,
}

impl DispatchContext {
    /// Capture the runtime of the calling task.
    pub fn current() -> Result<Self, SessionError> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|e| SessionError::NoDispatchContext(e.to_string()))
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }
}

/// Everything a transport constructor receives.
#[derive(Clone, Debug)]
pub struct TransportParams {
    pub endpoint_url: String,
    pub poll_interval: Duration,
    /// Passed through uninterpreted by the registry.
    pub context: DispatchContext,
}

/// A signaling channel to the remote peer(s).
///
/// Construction must not perform network I/O; activity starts in [`open`](Self::open).
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Registry key this transport was created under.
    fn type_name(&self) -> &str;
    fn endpoint_url(&self) -> &str;

    /// Start background activity, delivering inbound messages to `sink`.
    fn open(&self, sink: MessageSink) -> Result<(), SessionError>;

    async fn send(&self, message: SignalingMessage) -> Result<(), SessionError>;

    /// Stop all background activity. Idempotent; no timer or poll may outlive it.
    fn close(&self) -> Result<(), SessionError>;

    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_fails_outside_runtime() {
        let err = DispatchContext::current().unwrap_err();
        assert!(matches!(err, SessionError::NoDispatchContext(_)));
    }

    #[tokio::test]
    async fn current_captures_running_runtime() {
        let ctx = DispatchContext::current().unwrap();
        let value = ctx.spawn(async { 21 * 2 }).await.unwrap();
        assert_eq!(value, 42);
    }
}
