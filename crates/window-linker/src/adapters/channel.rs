//! In-memory paired contexts.
//!
//! Two endpoints joined by unbounded tokio channels, each with its own
//! origin. Posting follows the cross-context rules: the sender's origin is
//! stamped on the message, a reply port back to the sender is attached, and
//! a post whose target origin does not admit the receiver is silently
//! dropped.

use crate::domain::error::TransportError;
use crate::domain::types::TargetOrigin;
use crate::ports::transport::{InboundMessage, MessagePort, MessageSource};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// One side's inbox and the origin it answers to.
#[derive(Clone)]
struct Route {
    origin: String,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

/// Port from one context into the other.
#[derive(Clone)]
pub struct ChannelPort {
    from: Route,
    to: Route,
}

impl ChannelPort {
    /// Origin of the context this port delivers into.
    pub fn target_origin(&self) -> &str {
        &self.to.origin
    }

    fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

#[async_trait]
impl MessagePort for ChannelPort {
    async fn post(&self, data: Value, target_origin: &TargetOrigin) -> Result<(), TransportError> {
        if !target_origin.admits(&self.to.origin) {
            debug!(
                target_origin = %target_origin,
                receiver_origin = %self.to.origin,
                "Target origin mismatch, message dropped"
            );
            return Ok(());
        }

        let message = InboundMessage {
            data,
            origin: self.from.origin.clone(),
            source: Arc::new(self.reversed()),
        };
        self.to.tx.send(message).map_err(|_| TransportError::Closed)
    }
}

/// One endpoint of a pair.
pub struct ChannelContext {
    origin: String,
    inbox: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    peer: Arc<ChannelPort>,
}

impl ChannelContext {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Port that delivers into the peer context.
    pub fn port(&self) -> Arc<dyn MessagePort> {
        self.peer.clone()
    }

    /// Concrete port into the peer context.
    pub fn channel_port(&self) -> Arc<ChannelPort> {
        self.peer.clone()
    }

    /// Stop accepting messages. Buffered ones are still delivered, then
    /// `next_message` returns `None`.
    pub async fn close(&self) {
        self.inbox.lock().await.close();
    }
}

#[async_trait]
impl MessageSource for ChannelContext {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn next_message(&self) -> Option<InboundMessage> {
        self.inbox.lock().await.recv().await
    }
}

/// Create two linked contexts with the given origins.
pub fn pair(
    first_origin: impl Into<String>,
    second_origin: impl Into<String>,
) -> (ChannelContext, ChannelContext) {
    let first_origin = first_origin.into();
    let second_origin = second_origin.into();
    let (first_tx, first_rx) = mpsc::unbounded_channel();
    let (second_tx, second_rx) = mpsc::unbounded_channel();

    let first_route = Route {
        origin: first_origin.clone(),
        tx: first_tx,
    };
    let second_route = Route {
        origin: second_origin.clone(),
        tx: second_tx,
    };

    let first = ChannelContext {
        origin: first_origin,
        inbox: Mutex::new(first_rx),
        peer: Arc::new(ChannelPort {
            from: first_route.clone(),
            to: second_route.clone(),
        }),
    };
    let second = ChannelContext {
        origin: second_origin,
        inbox: Mutex::new(second_rx),
        peer: Arc::new(ChannelPort {
            from: second_route,
            to: first_route,
        }),
    };

    (first, second)
}
