//! Error types for the linker.
//!
//! Nothing crosses the transport except a message string, so every
//! initiator-facing failure is message-only.

use std::time::Duration;

/// Prefix stamped on every error message the linker itself produces.
pub const ERROR_PREFIX: &str = "[window-linker-error]";

/// Fallback when a failing handler yields no usable message.
pub const UNKNOWN_ERROR_MESSAGE: &str = "[window-linker-error]unknown error";

/// Failure message sent back when no handler is registered for an action.
pub fn handler_not_found_message(action_name: &str) -> String {
    format!("{ERROR_PREFIX}cannot find a handler for action '{action_name}'")
}

/// Errors surfaced to the caller of `send`.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// No response arrived within the configured window
    #[error("[window-linker-error]window communication timeout after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    /// Peer reported a failure (missing handler or handler error)
    #[error("{0}")]
    Remote(String),

    /// The request could not be handed to the transport
    #[error("[window-linker-error]transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Envelope could not be encoded
    #[error("[window-linker-error]{0}")]
    Envelope(#[from] EnvelopeError),

    /// Typed payload or result did not convert to/from JSON
    #[error("[window-linker-error]payload conversion failed: {0}")]
    Payload(#[source] serde_json::Error),

    /// The pending entry was dropped before it settled
    #[error("[window-linker-error]response channel closed")]
    Abandoned,
}

impl LinkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, LinkError::Remote(_))
    }
}

/// Result type for linker operations
pub type LinkResult<T> = Result<T, LinkError>;

/// Inbound data that is not a well-formed envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("message has no envelope tag")]
    MissingTag,

    #[error("unknown envelope tag '{0}'")]
    UnknownTag(String),

    #[error("invalid envelope fields: {0}")]
    InvalidFields(#[source] serde_json::Error),

    #[error("envelope encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Transport-level failures reported by a `MessagePort`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("peer context closed")]
    Closed,

    #[error("post failed: {0}")]
    PostFailed(String),
}
