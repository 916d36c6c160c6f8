/// Typed error hierarchy for session assembly, dispatch and teardown.
/// `start` failures are returned synchronously; dispatch failures only travel
/// through the hub's error channel and the log.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SessionError {
    // Fatal to the current start attempt
    #[error("unknown transport type: {0}")]
    UnknownTransportType(String),
    #[error("invalid signaling parameters: {0}")]
    InvalidParams(String),
    #[error("no dispatch context: {0}")]
    NoDispatchContext(String),

    // Collaborator failures
    #[error("transport error: {0}")]
    Transport(String),
    #[error("engine error: {0}")]
    Engine(String),

    // Reported, never propagated to the caller of start
    #[error("handler '{handler}' failed on '{event}': {reason}")]
    HandlerDispatch {
        handler: String,
        event: String,
        reason: String,
    },
    #[error("engine teardown failed: {0}")]
    EngineTeardown(String),
}

impl SessionError {
    /// Errors that abort `start` and leave the orchestrator idle.
    pub fn is_start_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownTransportType(_)
                | Self::InvalidParams(_)
                | Self::NoDispatchContext(_)
                | Self::Transport(_)
                | Self::Engine(_)
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::UnknownTransportType(_) => "unknown_transport_type",
            Self::InvalidParams(_) => "invalid_params",
            Self::NoDispatchContext(_) => "no_dispatch_context",
            Self::Transport(_) => "transport",
            Self::Engine(_) => "engine",
            Self::HandlerDispatch { .. } => "handler_dispatch",
            Self::EngineTeardown(_) => "engine_teardown",
        }
    }
}

/// Failure returned by a handler while consuming an event.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
