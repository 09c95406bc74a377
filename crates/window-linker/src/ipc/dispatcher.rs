//! Message dispatcher - the single inbound entry point.
//!
//! Every inbound message is classified exactly once:
//! - no recognized tag -> warned and dropped
//! - request -> handler invocation on its own task, reply posted to sender
//! - response -> resolver
//!
//! Requests run on separate tasks, so a suspended handler never holds up
//! later messages. Receipt is ordered; completion is not.

use crate::diagnostics::DebugLogger;
use crate::domain::envelope::{Envelope, RequestEnvelope};
use crate::domain::pending::Resolution;
use crate::domain::types::TargetOrigin;
use crate::ipc::invoker::HandlerInvoker;
use crate::ipc::resolver::ResponseResolver;
use crate::ports::transport::InboundMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Statistics for inbound traffic
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Messages seen by the dispatcher
    pub total_received: AtomicU64,
    /// Messages dropped for lacking a recognized envelope
    pub total_malformed: AtomicU64,
    /// Request envelopes handled
    pub total_requests: AtomicU64,
    /// Response envelopes handled
    pub total_responses: AtomicU64,
    /// Responses posted back to requesters
    pub total_replies: AtomicU64,
    /// Replies the transport refused
    pub total_reply_errors: AtomicU64,
}

/// What the dispatcher did with one message.
#[derive(Debug)]
pub enum Dispatched {
    /// Not an envelope; dropped
    Ignored,
    /// Request handed to a task that invokes the handler and replies
    Request(JoinHandle<()>),
    /// Response applied to the pending table
    Response(Resolution),
}

#[derive(Clone)]
pub struct MessageDispatcher {
    invoker: HandlerInvoker,
    resolver: ResponseResolver,
    logger: DebugLogger,
    stats: Arc<DispatchStats>,
}

impl MessageDispatcher {
    pub fn new(invoker: HandlerInvoker, resolver: ResponseResolver, logger: DebugLogger) -> Self {
        Self {
            invoker,
            resolver,
            logger,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Classify and route one inbound message.
    ///
    /// Must be called from within a tokio runtime; requests are spawned.
    pub fn dispatch(&self, message: InboundMessage) -> Dispatched {
        self.stats.total_received.fetch_add(1, Ordering::Relaxed);
        self.logger.print("message event", &message);

        let envelope = match Envelope::decode(&message.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.stats.total_malformed.fetch_add(1, Ordering::Relaxed);
                warn!(origin = %message.origin, error = %e, "Unknown window message, ignoring");
                return Dispatched::Ignored;
            }
        };

        match envelope {
            Envelope::Request(request) => {
                self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
                self.logger
                    .print("handle request", &request.session_id.as_str());
                let dispatcher = self.clone();
                Dispatched::Request(tokio::spawn(async move {
                    dispatcher.serve_request(request, message).await;
                }))
            }
            Envelope::Response(response) => {
                self.stats.total_responses.fetch_add(1, Ordering::Relaxed);
                self.logger
                    .print("handle response", &response.session_id.as_str());
                Dispatched::Response(self.resolver.resolve(response))
            }
        }
    }

    /// Invoke the handler and post its response back to the sender.
    async fn serve_request(&self, request: RequestEnvelope, message: InboundMessage) {
        let session_id = request.session_id.clone();
        let Some(response) = self.invoker.invoke(request).await else {
            debug!(session_id = %session_id, "Sender ignores return, no reply");
            return;
        };

        let data = match Envelope::from(response).encode() {
            Ok(data) => data,
            Err(e) => {
                self.stats.total_reply_errors.fetch_add(1, Ordering::Relaxed);
                warn!(session_id = %session_id, error = %e, "Failed to encode response");
                return;
            }
        };

        let target = TargetOrigin::Exact(message.origin.clone());
        match message.source.post(data, &target).await {
            Ok(()) => {
                self.stats.total_replies.fetch_add(1, Ordering::Relaxed);
                debug!(session_id = %session_id, origin = %message.origin, "Posted response");
            }
            Err(e) => {
                self.stats.total_reply_errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    session_id = %session_id,
                    origin = %message.origin,
                    error = %e,
                    "Failed to post response"
                );
            }
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}
