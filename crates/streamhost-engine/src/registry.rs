use std::collections::HashMap;
use std::sync::Arc;

use streamhost_core::config::validate_poll_interval;
use streamhost_core::{
    DispatchContext, SessionError, SignalingParams, SignalingTransport, TransportParams,
};
use tracing::debug;

use crate::transports::{HttpSignaling, MemorySignaling};

/// Builds a transport from its construction parameters. Must not perform I/O.
pub type TransportConstructor = Arc<
    dyn Fn(TransportParams) -> Result<Arc<dyn SignalingTransport>, SessionError> + Send + Sync,
>;

/// Source of a registered transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportSource {
    BuiltIn,
    External(String),
}

struct TransportEntry {
    constructor: TransportConstructor,
    source: TransportSource,
}

/// Name → constructor table, populated at startup.
pub struct TransportRegistry {
    transports: HashMap<String, TransportEntry>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self {
            transports: HashMap::new(),
        }
    }

    /// Register a constructor. Re-registering a name replaces the entry.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F, source: TransportSource)
    where
        F: Fn(TransportParams) -> Result<Arc<dyn SignalingTransport>, SessionError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        debug!(transport = %name, ?source, "transport registered");
        self.transports.insert(
            name,
            TransportEntry {
                constructor: Arc::new(constructor),
                source,
            },
        );
    }

    /// Unregister a transport by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.transports.remove(name).is_some()
    }

    /// Check if a transport is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.transports.contains_key(name)
    }

    /// Get the source of a transport.
    pub fn source(&self, name: &str) -> Option<&TransportSource> {
        self.transports.get(name).map(|e| &e.source)
    }

    /// List all transport names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transports.keys().cloned().collect();
        names.sort();
        names
    }

    /// Total transport count.
    pub fn count(&self) -> usize {
        self.transports.len()
    }

    /// Instantiate the transport registered under `type_name`.
    ///
    /// The context is handed to the constructor untouched.
    pub fn create(
        &self,
        type_name: &str,
        endpoint_url: &str,
        poll_interval_secs: f64,
        context: DispatchContext,
    ) -> Result<Arc<dyn SignalingTransport>, SessionError> {
        let entry = self
            .transports
            .get(type_name)
            .ok_or_else(|| SessionError::UnknownTransportType(type_name.to_string()))?;
        let poll_interval = validate_poll_interval(poll_interval_secs)?;

        let transport = (entry.constructor)(TransportParams {
            endpoint_url: endpoint_url.to_string(),
            poll_interval,
            context,
        })?;
        debug!(transport = %type_name, endpoint = %endpoint_url, "transport created");
        Ok(transport)
    }

    pub fn create_from_params(
        &self,
        params: &SignalingParams,
        context: DispatchContext,
    ) -> Result<Arc<dyn SignalingTransport>, SessionError> {
        self.create(
            &params.transport_type,
            &params.endpoint_url,
            params.poll_interval_secs,
            context,
        )
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with the built-in `http` and `memory` transports.
pub fn create_default_registry() -> TransportRegistry {
    let mut registry = TransportRegistry::new();
    registry.register(
        HttpSignaling::TYPE_NAME,
        |params| Ok(Arc::new(HttpSignaling::new(params)?) as Arc<dyn SignalingTransport>),
        TransportSource::BuiltIn,
    );
    registry.register(
        MemorySignaling::TYPE_NAME,
        |params| Ok(Arc::new(MemorySignaling::from_params(params)) as Arc<dyn SignalingTransport>),
        TransportSource::BuiltIn,
    );
    registry
}
