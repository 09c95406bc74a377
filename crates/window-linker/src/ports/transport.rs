//! Transport ports consumed by the linker.
//!
//! The channel is best-effort and fire-and-forget: a successful `post` says
//! nothing about delivery.

use crate::domain::error::TransportError;
use crate::domain::types::TargetOrigin;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Handle for posting structured data into another context.
#[async_trait]
pub trait MessagePort: Send + Sync {
    /// Post a message. The transport drops it silently if the receiving
    /// context's origin is not admitted by `target_origin`.
    async fn post(&self, data: Value, target_origin: &TargetOrigin) -> Result<(), TransportError>;
}

/// Inbound message event for the local context.
#[derive(Clone)]
pub struct InboundMessage {
    /// Structured payload as posted by the sender
    pub data: Value,
    /// Origin of the sending context
    pub origin: String,
    /// Port that reaches the sender
    pub source: Arc<dyn MessagePort>,
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("data", &self.data)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Stream of inbound messages for the local context.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Origin of the local context
    fn origin(&self) -> &str;

    /// Next inbound message, or `None` once the context is closed.
    async fn next_message(&self) -> Option<InboundMessage>;
}
