//! Session orchestrator: assembles transport, engine and event hub, and owns
//! the session lifecycle.
//!
//! The orchestrator is a plain value owned by the caller. `start` and `stop`
//! take `&mut self`, so one owner drives the lifecycle at a time.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use streamhost_core::{
    ConnectionConfig, DispatchContext, EncoderPreference, EngineBuilder, EngineDependencies,
    SessionEngine, SessionError, SessionHandler, SessionId, SignalingParams, SignalingTransport,
    SubscriptionId,
};
use streamhost_engine::TransportRegistry;
use streamhost_settings::{resolve_override, SettingsError, StreamingSettings};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::event_hub::EventHub;

pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
}

/// Stored configuration used when `start` is called without explicit options.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub signaling: SignalingParams,
    pub connection: ConnectionConfig,
    pub encoder: EncoderPreference,
    /// Start from [`SessionOrchestrator::on_ready`].
    pub auto_start: bool,
    /// Directory searched for the override file. `None` disables overrides.
    pub override_root: Option<PathBuf>,
    pub event_queue_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            signaling: SignalingParams::default(),
            connection: ConnectionConfig::default(),
            encoder: EncoderPreference::default(),
            auto_start: true,
            override_root: None,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_override_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.override_root = Some(root.into());
        self
    }
}

impl From<&StreamingSettings> for OrchestratorConfig {
    fn from(settings: &StreamingSettings) -> Self {
        Self {
            signaling: settings.signaling.clone(),
            connection: settings.connection.clone(),
            encoder: settings.encoder(),
            auto_start: settings.auto_start,
            override_root: None,
            event_queue_capacity: settings.event_queue_capacity,
        }
    }
}

/// Per-call overrides for [`SessionOrchestrator::start`].
///
/// Every field left `None` falls back to the stored configuration:
/// - `connection`: [`OrchestratorConfig::connection`]
/// - `encoder`: [`OrchestratorConfig::encoder`]
/// - `transport`: created through the registry from [`OrchestratorConfig::signaling`]
/// - `handlers`: the handlers added with [`SessionOrchestrator::add_handler`]
#[derive(Clone, Default)]
pub struct StartOptions {
    pub connection: Option<ConnectionConfig>,
    pub encoder: Option<EncoderPreference>,
    pub transport: Option<Arc<dyn SignalingTransport>>,
    pub handlers: Option<Vec<Arc<dyn SessionHandler>>>,
}

impl StartOptions {
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_encoder(mut self, encoder: EncoderPreference) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn SignalingTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_handlers(mut self, handlers: Vec<Arc<dyn SessionHandler>>) -> Self {
        self.handlers = Some(handlers);
        self
    }
}

/// Snapshot of the orchestrator for logging and status output.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub state: SessionState,
    pub session_id: Option<SessionId>,
    pub transport_type: Option<String>,
    pub endpoint_url: Option<String>,
    pub encoder: Option<EncoderPreference>,
    pub handler_count: usize,
    pub started_at: Option<DateTime<Utc>>,
}

struct ActiveSession {
    id: SessionId,
    engine: Arc<dyn SessionEngine>,
    transport: Arc<dyn SignalingTransport>,
    hub: EventHub,
    /// `(handler name, subscription)` in dispatch order.
    subscriptions: Vec<(String, SubscriptionId)>,
    started_at: DateTime<Utc>,
}

pub struct SessionOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<TransportRegistry>,
    engine_builder: Arc<dyn EngineBuilder>,
    handlers: Vec<Arc<dyn SessionHandler>>,
    active: Option<ActiveSession>,
    config_error: Option<SettingsError>,
}

impl SessionOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<TransportRegistry>,
        engine_builder: Arc<dyn EngineBuilder>,
    ) -> Self {
        Self {
            config,
            registry,
            engine_builder,
            handlers: Vec::new(),
            active: None,
            config_error: None,
        }
    }

    /// Append a handler to the default set used by `start`.
    pub fn add_handler(&mut self, handler: Arc<dyn SessionHandler>) {
        self.handlers.push(handler);
    }

    pub fn with_handlers(mut self, handlers: Vec<Arc<dyn SessionHandler>>) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Signaling parameters the next registry-created transport will use.
    pub fn signaling(&self) -> &SignalingParams {
        &self.config.signaling
    }

    /// Read the override file and apply its endpoint, if any.
    ///
    /// A malformed file is logged and kept for [`config_error`](Self::config_error);
    /// the stored configuration is left untouched. Returns whether the endpoint changed.
    pub fn resolve_overrides(&mut self) -> bool {
        let Some(root) = self.config.override_root.as_deref() else {
            return false;
        };
        match resolve_override(root) {
            Ok(overrides) => {
                self.config_error = None;
                let applied = overrides.apply_to(&mut self.config.signaling);
                if applied {
                    info!(
                        endpoint = %self.config.signaling.endpoint_url,
                        "signaling endpoint overridden"
                    );
                }
                applied
            }
            Err(e) => {
                warn!(error = %e, "override file unreadable, continuing with defaults");
                self.config_error = Some(e);
                false
            }
        }
    }

    /// The last override parse failure, if any.
    pub fn config_error(&self) -> Option<&SettingsError> {
        self.config_error.as_ref()
    }

    /// Host-ready signal: resolve overrides and start if auto start is on.
    pub fn on_ready(&mut self) -> Result<(), SessionError> {
        if !self.config.auto_start {
            debug!("auto start disabled");
            return Ok(());
        }
        if self.is_running() {
            return Ok(());
        }
        let _ = self.resolve_overrides();
        self.start(StartOptions::default())
    }

    /// Assemble and start a session. A no-op while one is running.
    ///
    /// On error nothing is left running and the state stays Idle.
    pub fn start(&mut self, options: StartOptions) -> Result<(), SessionError> {
        if self.is_running() {
            debug!("session already running, start ignored");
            return Ok(());
        }

        let context = DispatchContext::current()?;
        let connection = Arc::new(
            options
                .connection
                .unwrap_or_else(|| self.config.connection.clone()),
        );
        let encoder = options.encoder.unwrap_or(self.config.encoder);
        let transport = match options.transport {
            Some(transport) => transport,
            None => {
                self.config.signaling.validate()?;
                self.registry
                    .create_from_params(&self.config.signaling, context.clone())?
            }
        };
        let handlers = options.handlers.unwrap_or_else(|| self.handlers.clone());

        let (events_tx, events_rx) = mpsc::channel(self.config.event_queue_capacity.max(1));
        let engine = self
            .engine_builder
            .build(EngineDependencies {
                config: connection,
                encoder,
                transport: Arc::clone(&transport),
                scheduler: context.clone(),
                events: events_tx,
            })
            .inspect_err(|_| {
                let _ = transport.close();
            })?;

        let hub = EventHub::new(Arc::clone(&engine), events_rx);
        let mut subscriptions = Vec::with_capacity(handlers.len());
        for handler in &handlers {
            handler.bind_engine(Arc::clone(&engine));
            let id = hub.subscribe(Arc::clone(handler));
            subscriptions.push((handler.name().to_string(), id));
        }
        if let Err(e) = hub.run(&context) {
            let _ = engine.dispose();
            return Err(e);
        }

        let id = SessionId::new();
        info!(
            session_id = %id,
            transport = %transport.type_name(),
            endpoint = %transport.endpoint_url(),
            encoder = %encoder,
            handlers = handlers.len(),
            "session started"
        );
        self.active = Some(ActiveSession {
            id,
            engine,
            transport,
            hub,
            subscriptions,
            started_at: Utc::now(),
        });
        Ok(())
    }

    /// Tear down the running session. A no-op while Idle.
    ///
    /// The hub is closed before the engine is disposed, so no handler sees an
    /// event after this returns. The state is Idle afterwards even when
    /// disposal fails; that failure is returned as `EngineTeardown`.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        let Some(session) = self.active.take() else {
            return Ok(());
        };

        session.hub.close();
        match session.engine.dispose() {
            Ok(()) => {
                info!(session_id = %session.id, "session stopped");
                Ok(())
            }
            Err(e) => {
                let err = match e {
                    SessionError::EngineTeardown(_) => e,
                    other => SessionError::EngineTeardown(other.to_string()),
                };
                error!(session_id = %session.id, error = %err, "session teardown failed");
                Err(err)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.active.as_ref().map(|s| &s.id)
    }

    pub fn engine(&self) -> Option<Arc<dyn SessionEngine>> {
        self.active.as_ref().map(|s| Arc::clone(&s.engine))
    }

    /// Transport of the running session.
    pub fn transport(&self) -> Option<Arc<dyn SignalingTransport>> {
        self.active.as_ref().map(|s| Arc::clone(&s.transport))
    }

    /// Subscriptions of the running session as `(handler name, id)`, in
    /// dispatch order.
    pub fn subscriptions(&self) -> Vec<(String, SubscriptionId)> {
        self.active
            .as_ref()
            .map(|s| s.subscriptions.clone())
            .unwrap_or_default()
    }

    /// Remove one handler from the running session. Other handlers keep
    /// receiving events. Returns false while Idle or for an unknown id.
    pub fn unsubscribe(&mut self, id: &SubscriptionId) -> bool {
        let Some(session) = self.active.as_mut() else {
            return false;
        };
        if !session.hub.unsubscribe(id) {
            return false;
        }
        session.subscriptions.retain(|(_, sub)| sub != id);
        debug!(session_id = %session.id, subscription = %id, "handler unsubscribed");
        true
    }

    /// Handler failures of the running session.
    pub fn dispatch_errors(&self) -> Option<broadcast::Receiver<SessionError>> {
        self.active.as_ref().map(|s| s.hub.dispatch_errors())
    }

    pub fn info(&self) -> SessionInfo {
        match &self.active {
            Some(session) => SessionInfo {
                state: SessionState::Running,
                session_id: Some(session.id.clone()),
                transport_type: Some(session.transport.type_name().to_string()),
                endpoint_url: Some(session.transport.endpoint_url().to_string()),
                encoder: Some(session.engine.encoder()),
                handler_count: session.hub.subscriber_count(),
                started_at: Some(session.started_at),
            },
            None => SessionInfo {
                state: SessionState::Idle,
                session_id: None,
                transport_type: None,
                endpoint_url: None,
                encoder: None,
                handler_count: 0,
                started_at: None,
            },
        }
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "teardown on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use streamhost_core::{ConnectionId, IceServer, SessionEvent, SignalingMessage};
    use streamhost_engine::mock::MockEngineBuilder;
    use streamhost_engine::{
        create_default_registry, MemorySignaling, SignalingEngineBuilder, TransportSource,
    };
    use streamhost_settings::OVERRIDE_FILE_NAME;

    use super::*;
    use crate::testing::{wait_for, RecordingHandler};

    /// Registry whose `memory` transports are kept for the test to drive.
    fn capturing_registry() -> (Arc<TransportRegistry>, Arc<Mutex<Vec<Arc<MemorySignaling>>>>) {
        let created: Arc<Mutex<Vec<Arc<MemorySignaling>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&created);
        let mut registry = TransportRegistry::new();
        registry.register(
            "memory",
            move |params| {
                let transport = Arc::new(MemorySignaling::from_params(params));
                sink.lock().push(Arc::clone(&transport));
                Ok(transport as Arc<dyn SignalingTransport>)
            },
            TransportSource::BuiltIn,
        );
        (Arc::new(registry), created)
    }

    fn memory_config() -> OrchestratorConfig {
        OrchestratorConfig {
            signaling: SignalingParams {
                transport_type: "memory".into(),
                endpoint_url: "memory://default".into(),
                poll_interval_secs: 0.1,
            },
            ..Default::default()
        }
    }

    fn connect(id: &str) -> SignalingMessage {
        SignalingMessage::Connect {
            connection_id: ConnectionId::from_raw(id),
            polite: true,
        }
    }

    #[tokio::test]
    async fn start_with_registered_type_runs() {
        let (registry, created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone());

        assert_eq!(orch.state(), SessionState::Idle);
        orch.start(StartOptions::default()).unwrap();

        assert_eq!(orch.state(), SessionState::Running);
        assert!(orch.session_id().is_some());
        assert_eq!(builder.build_count(), 1);
        assert_eq!(created.lock().len(), 1);
        assert_eq!(orch.transport().unwrap().endpoint_url(), "memory://default");
        orch.stop().unwrap();
    }

    #[tokio::test]
    async fn unknown_transport_leaves_idle() {
        let builder = Arc::new(MockEngineBuilder::new());
        let config = OrchestratorConfig {
            signaling: SignalingParams {
                transport_type: "carrier-pigeon".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut orch =
            SessionOrchestrator::new(config, Arc::new(create_default_registry()), builder.clone());

        let err = orch.start(StartOptions::default()).unwrap_err();
        assert!(matches!(err, SessionError::UnknownTransportType(ref n) if n == "carrier-pigeon"));
        assert_eq!(orch.state(), SessionState::Idle);
        assert_eq!(builder.build_count(), 0);
    }

    #[tokio::test]
    async fn invalid_interval_leaves_idle() {
        let (registry, created) = capturing_registry();
        let mut config = memory_config();
        config.signaling.poll_interval_secs = 0.0;
        let mut orch =
            SessionOrchestrator::new(config, registry, Arc::new(MockEngineBuilder::new()));

        let err = orch.start(StartOptions::default()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidParams(_)));
        assert!(!orch.is_running());
        assert!(created.lock().is_empty());
    }

    #[tokio::test]
    async fn start_twice_is_noop() {
        let (registry, _created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        let log = RecordingHandler::shared_log();
        let handler = RecordingHandler::new("a", &log);
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone())
            .with_handlers(vec![handler.clone()]);

        orch.start(StartOptions::default()).unwrap();
        let first = orch.session_id().cloned();
        orch.start(StartOptions::default()).unwrap();

        assert_eq!(builder.build_count(), 1);
        assert_eq!(handler.bind_count(), 1);
        assert_eq!(orch.info().handler_count, 1);
        assert_eq!(orch.session_id().cloned(), first);

        assert!(builder.emit(SessionEvent::Started).await);
        assert!(wait_for(|| log.lock().len() == 1).await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test]
    async fn handlers_are_bound_inside_start_before_any_event() {
        let (registry, _created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        let log = RecordingHandler::shared_log();
        let handler = RecordingHandler::new("a", &log);
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone())
            .with_handlers(vec![handler.clone()]);

        orch.start(StartOptions::default()).unwrap();
        // No await since `start`: the bind ran on this task.
        assert_eq!(handler.bind_count(), 1);
        assert!(log.lock().is_empty());

        assert!(builder.emit(SessionEvent::Started).await);
        assert!(wait_for(|| log.lock().len() == 1).await);
        assert_eq!(handler.bind_count(), 1);
    }

    #[tokio::test]
    async fn stop_while_idle_is_noop() {
        let (registry, _created) = capturing_registry();
        let mut orch =
            SessionOrchestrator::new(memory_config(), registry, Arc::new(MockEngineBuilder::new()));
        assert!(orch.stop().is_ok());
        assert!(orch.stop().is_ok());
        assert_eq!(orch.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn stop_disposes_engine_and_closes_transport() {
        let (registry, created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone());
        orch.start(StartOptions::default()).unwrap();

        orch.stop().unwrap();
        assert_eq!(orch.state(), SessionState::Idle);
        assert!(orch.engine().is_none());
        let engine = builder.last_engine().unwrap();
        assert!(engine.is_disposed());
        assert_eq!(engine.dispose_calls(), 1);
        assert!(created.lock()[0].is_closed());
    }

    #[tokio::test]
    async fn failed_dispose_still_goes_idle() {
        let (registry, _created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new().with_failing_dispose());
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder);
        orch.start(StartOptions::default()).unwrap();

        let err = orch.stop().unwrap_err();
        assert!(matches!(err, SessionError::EngineTeardown(_)));
        assert_eq!(orch.state(), SessionState::Idle);
        assert!(orch.stop().is_ok());
    }

    #[tokio::test]
    async fn failed_build_closes_transport_and_stays_idle() {
        let (registry, created) = capturing_registry();
        let builder =
            Arc::new(MockEngineBuilder::new().with_build_error(SessionError::Engine("no gpu".into())));
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder);

        assert!(matches!(
            orch.start(StartOptions::default()),
            Err(SessionError::Engine(_))
        ));
        assert!(!orch.is_running());
        assert!(created.lock()[0].is_closed());
    }

    #[tokio::test]
    async fn handlers_receive_events_in_registration_order() {
        let (registry, _created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        let log = RecordingHandler::shared_log();
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone());
        for name in ["a", "b", "c"] {
            orch.add_handler(RecordingHandler::new(name, &log));
        }
        orch.start(StartOptions::default()).unwrap();

        assert!(builder.emit(SessionEvent::Started).await);
        assert!(wait_for(|| log.lock().len() == 3).await);
        let order: Vec<String> = log.lock().iter().map(|(h, _)| h.clone()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failing_handler_is_reported_and_isolated() {
        let (registry, _created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        let log = RecordingHandler::shared_log();
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone())
            .with_handlers(vec![
                RecordingHandler::new("a", &log),
                RecordingHandler::failing_on("b", &log, "disconnected"),
                RecordingHandler::new("c", &log),
            ]);
        orch.start(StartOptions::default()).unwrap();
        let mut errors = orch.dispatch_errors().unwrap();

        assert!(
            builder
                .emit(SessionEvent::Disconnected {
                    connection_id: ConnectionId::from_raw("c1"),
                })
                .await
        );

        let err = tokio::time::timeout(Duration::from_secs(2), errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(err.error_kind(), "handler_dispatch");
        assert!(wait_for(|| log.lock().len() == 2).await);
        let order: Vec<String> = log.lock().iter().map(|(h, _)| h.clone()).collect();
        assert_eq!(order, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn unsubscribed_handler_stops_receiving() {
        let (registry, _created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        let log = RecordingHandler::shared_log();
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone())
            .with_handlers(vec![
                RecordingHandler::new("a", &log),
                RecordingHandler::new("b", &log),
                RecordingHandler::new("c", &log),
            ]);
        orch.start(StartOptions::default()).unwrap();

        let subs = orch.subscriptions();
        let names: Vec<&str> = subs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        let b = subs[1].1.clone();

        assert!(builder.emit(SessionEvent::Started).await);
        assert!(wait_for(|| log.lock().len() == 3).await);

        assert!(orch.unsubscribe(&b));
        assert!(!orch.unsubscribe(&b));
        assert_eq!(orch.subscriptions().len(), 2);
        assert_eq!(orch.info().handler_count, 2);

        assert!(
            builder
                .emit(SessionEvent::Disconnected {
                    connection_id: ConnectionId::from_raw("c1"),
                })
                .await
        );
        assert!(wait_for(|| log.lock().len() == 5).await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after: Vec<String> = log.lock()[3..].iter().map(|(h, _)| h.clone()).collect();
        assert_eq!(after, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn unsubscribe_while_idle_is_false() {
        let (registry, _created) = capturing_registry();
        let mut orch =
            SessionOrchestrator::new(memory_config(), registry, Arc::new(MockEngineBuilder::new()));
        assert!(orch.subscriptions().is_empty());
        assert!(!orch.unsubscribe(&SubscriptionId::new()));
    }

    #[tokio::test]
    async fn no_events_after_stop_even_if_transport_emits_late() {
        let (registry, created) = capturing_registry();
        let log = RecordingHandler::shared_log();
        let mut orch = SessionOrchestrator::new(
            memory_config(),
            registry,
            Arc::new(SignalingEngineBuilder::new()),
        )
        .with_handlers(vec![RecordingHandler::new("a", &log)]);
        orch.start(StartOptions::default()).unwrap();

        let transport = Arc::clone(&created.lock()[0]);
        transport.inject(connect("c1"));
        // started, connection_created, connected
        assert!(wait_for(|| log.lock().len() == 3).await);

        orch.stop().unwrap();
        let seen = log.lock().len();
        transport.inject(connect("c2"));
        transport.inject(connect("c3"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(log.lock().len(), seen);
    }

    #[tokio::test]
    async fn explicit_options_take_precedence() {
        let (registry, created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        let default_log = RecordingHandler::shared_log();
        let explicit_log = RecordingHandler::shared_log();
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone())
            .with_handlers(vec![RecordingHandler::new("default", &default_log)]);

        let transport = Arc::new(MemorySignaling::new(
            "memory://explicit",
            DispatchContext::current().unwrap(),
        ));
        let connection = ConnectionConfig {
            ice_servers: vec![IceServer::turn("turn:relay.example.com", "u", "p")],
        };
        orch.start(
            StartOptions::default()
                .with_connection(connection)
                .with_encoder(EncoderPreference::Software)
                .with_transport(transport)
                .with_handlers(vec![RecordingHandler::new("explicit", &explicit_log)]),
        )
        .unwrap();

        assert!(created.lock().is_empty());
        let engine = orch.engine().unwrap();
        assert_eq!(engine.encoder(), EncoderPreference::Software);
        assert_eq!(engine.config().ice_servers[0].urls[0], "turn:relay.example.com");
        assert_eq!(orch.info().endpoint_url.as_deref(), Some("memory://explicit"));

        assert!(builder.emit(SessionEvent::Started).await);
        assert!(wait_for(|| explicit_log.lock().len() == 1).await);
        assert!(default_log.lock().is_empty());
    }

    #[tokio::test]
    async fn override_endpoint_reaches_transport() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(OVERRIDE_FILE_NAME),
            r#"{"endpointURLOverride": "X", "renderTiledCanvas": true}"#,
        )
        .unwrap();

        let (registry, created) = capturing_registry();
        let mut orch = SessionOrchestrator::new(
            memory_config().with_override_root(dir.path()),
            registry,
            Arc::new(MockEngineBuilder::new()),
        );
        orch.on_ready().unwrap();

        assert!(orch.is_running());
        assert_eq!(created.lock()[0].endpoint_url(), "X");
        assert_eq!(orch.signaling().transport_type, "memory");
        assert!((orch.signaling().poll_interval_secs - 0.1).abs() < f64::EPSILON);
        assert!(orch.config_error().is_none());
    }

    #[tokio::test]
    async fn missing_override_uses_default_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, created) = capturing_registry();
        let mut orch = SessionOrchestrator::new(
            memory_config().with_override_root(dir.path()),
            registry,
            Arc::new(MockEngineBuilder::new()),
        );
        orch.on_ready().unwrap();

        assert_eq!(created.lock()[0].endpoint_url(), "memory://default");
        assert!(orch.config_error().is_none());
    }

    #[tokio::test]
    async fn malformed_override_is_reported_but_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OVERRIDE_FILE_NAME), "{ nope").unwrap();

        let (registry, created) = capturing_registry();
        let mut orch = SessionOrchestrator::new(
            memory_config().with_override_root(dir.path()),
            registry,
            Arc::new(MockEngineBuilder::new()),
        );
        orch.on_ready().unwrap();

        assert!(orch.is_running());
        assert_eq!(created.lock()[0].endpoint_url(), "memory://default");
        assert!(matches!(orch.config_error(), Some(SettingsError::Parse { .. })));
    }

    #[tokio::test]
    async fn on_ready_respects_auto_start() {
        let (registry, created) = capturing_registry();
        let config = OrchestratorConfig {
            auto_start: false,
            ..memory_config()
        };
        let mut orch = SessionOrchestrator::new(config, registry, Arc::new(MockEngineBuilder::new()));
        orch.on_ready().unwrap();

        assert!(!orch.is_running());
        assert!(created.lock().is_empty());
    }

    #[tokio::test]
    async fn restart_after_stop_builds_new_engine() {
        let (registry, created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        let log = RecordingHandler::shared_log();
        let handler = RecordingHandler::new("a", &log);
        let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone())
            .with_handlers(vec![handler.clone()]);

        orch.start(StartOptions::default()).unwrap();
        let first = orch.session_id().cloned();
        orch.stop().unwrap();
        orch.start(StartOptions::default()).unwrap();

        assert_eq!(builder.build_count(), 2);
        assert_eq!(handler.bind_count(), 2);
        assert_eq!(created.lock().len(), 2);
        assert_ne!(orch.session_id().cloned(), first);
    }

    #[tokio::test]
    async fn drop_stops_running_session() {
        let (registry, created) = capturing_registry();
        let builder = Arc::new(MockEngineBuilder::new());
        {
            let mut orch = SessionOrchestrator::new(memory_config(), registry, builder.clone());
            orch.start(StartOptions::default()).unwrap();
        }
        assert!(builder.last_engine().unwrap().is_disposed());
        assert!(created.lock()[0].is_closed());
    }

    #[test]
    fn start_outside_runtime_fails() {
        let (registry, _created) = capturing_registry();
        let mut orch =
            SessionOrchestrator::new(memory_config(), registry, Arc::new(MockEngineBuilder::new()));
        let err = orch.start(StartOptions::default()).unwrap_err();
        assert!(matches!(err, SessionError::NoDispatchContext(_)));
        assert_eq!(orch.state(), SessionState::Idle);
    }

    #[test]
    fn config_from_settings() {
        let mut settings = StreamingSettings::default();
        settings.hardware_encoder = false;
        settings.auto_start = false;
        settings.event_queue_capacity = 32;

        let config = OrchestratorConfig::from(&settings);
        assert_eq!(config.encoder, EncoderPreference::Software);
        assert!(!config.auto_start);
        assert_eq!(config.event_queue_capacity, 32);
        assert!(config.override_root.is_none());
    }

    #[test]
    fn idle_info_serializes() {
        let (registry, _created) = capturing_registry();
        let orch =
            SessionOrchestrator::new(memory_config(), registry, Arc::new(MockEngineBuilder::new()));
        let value = serde_json::to_value(orch.info()).unwrap();
        assert_eq!(value["state"], "idle");
        assert!(value["sessionId"].is_null());
        assert_eq!(value["handlerCount"], 0);
    }
}
