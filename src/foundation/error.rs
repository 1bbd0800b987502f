use crate::protocol::command::CommandKind;

/// Convenience result type used across lofi-stripes.
pub type StripesResult<T> = Result<T, StripesError>;

/// Top-level error taxonomy for the coordination layer.
///
/// The first five variants are the failure kinds a render call can end with; they are kept
/// distinct all the way up to the caller of
/// [`RenderScheduler::request_render`](crate::RenderScheduler::request_render).
#[derive(thiserror::Error, Debug)]
pub enum StripesError {
    /// A message crossing the channel was malformed or could not be delivered.
    #[error("transport error: {0}")]
    Transport(String),

    /// The worker terminated abnormally or is gone.
    #[error("channel fault: {0}")]
    ChannelFault(String),

    /// A response did not belong to the request that was outstanding.
    #[error("protocol mismatch: expected {expected} response, got {actual}")]
    ProtocolMismatch {
        /// Command kind that was sent.
        expected: CommandKind,
        /// Command kind the response was tagged with.
        actual: CommandKind,
    },

    /// The rendering engine rejected its input or was not ready.
    #[error("engine error: {0}")]
    Engine(String),

    /// A call did not complete within the configured deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Invalid user-provided data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Work was abandoned before it finished.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StripesError {
    /// Build a [`StripesError::Transport`] value.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Build a [`StripesError::ChannelFault`] value.
    pub fn channel_fault(msg: impl Into<String>) -> Self {
        Self::ChannelFault(msg.into())
    }

    /// Build a [`StripesError::ProtocolMismatch`] value.
    pub fn protocol_mismatch(expected: CommandKind, actual: CommandKind) -> Self {
        Self::ProtocolMismatch { expected, actual }
    }

    /// Build a [`StripesError::Engine`] value.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Build a [`StripesError::Timeout`] value.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Build a [`StripesError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StripesError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`StripesError::Cancelled`] value.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Short, stable name of the failure kind, used in call diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::ChannelFault(_) => "channel_fault",
            Self::ProtocolMismatch { .. } => "protocol_mismatch",
            Self::Engine(_) => "engine",
            Self::Timeout(_) => "timeout",
            Self::Validation(_) => "validation",
            Self::Serde(_) => "serde",
            Self::Cancelled(_) => "cancelled",
            Self::Other(_) => "other",
        }
    }
}

/// Failure reported by a [`RenderEngine`](crate::RenderEngine) on the worker side.
///
/// Engine errors never escape the worker: the dispatcher turns them into error responses tagged
/// with the command that failed.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    /// Build an engine error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable failure description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
