//! The linker instance: owns the per-instance tables, installs the inbound
//! listener and issues requests.

use crate::diagnostics::{DebugLogger, DiagnosticSink, TracingSink};
use crate::domain::config::{ConfigError, LinkerConfig, SendOptions};
use crate::domain::envelope::{Envelope, RequestEnvelope};
use crate::domain::error::{LinkError, LinkResult};
use crate::domain::pending::{sweep_task, PendingRequestTable};
use crate::domain::registry::{async_handler, sync_handler, ActionHandlerRegistry, HandlerResult};
use crate::domain::session::SessionId;
use crate::ipc::{HandlerInvoker, MessageDispatcher, ResponseResolver};
use crate::ports::transport::{MessagePort, MessageSource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Point-in-time counters for one linker instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkerStats {
    /// Requests that wait for a response
    pub requests_sent: u64,
    /// Fire-and-forget requests
    pub ignored_sent: u64,
    /// Requests settled by a response
    pub responses_settled: u64,
    /// Settled requests whose peer reported a failure
    pub remote_failures: u64,
    /// Requests rejected by their timer
    pub timeouts: u64,
    /// Responses discarded because their request had timed out
    pub late_responses: u64,
    /// Responses with no matching request
    pub orphan_responses: u64,
    /// Timed-out entries reclaimed by the sweep
    pub swept: u64,
    /// Inbound messages seen
    pub messages_received: u64,
    /// Inbound messages without a recognized envelope
    pub malformed_messages: u64,
    /// Response envelopes received, matched or not
    pub responses_received: u64,
    /// Inbound requests handled
    pub requests_served: u64,
    /// Responses posted back to peers
    pub replies_sent: u64,
    /// Responses that could not be encoded or posted
    pub reply_errors: u64,
    /// Entries currently in the pending table
    pub pending: usize,
}

struct LinkerInner {
    config: LinkerConfig,
    source: Arc<dyn MessageSource>,
    pending: Arc<PendingRequestTable>,
    registry: Arc<ActionHandlerRegistry>,
    dispatcher: MessageDispatcher,
    logger: DebugLogger,
    initialized: AtomicBool,
    requests_sent: AtomicU64,
    ignored_sent: AtomicU64,
}

/// Request/response endpoint for one context.
///
/// Cloning yields another handle to the same instance. Separate instances
/// share nothing.
#[derive(Clone)]
pub struct WindowLinker {
    inner: Arc<LinkerInner>,
}

impl WindowLinker {
    /// Create a linker reading inbound messages from `source`.
    ///
    /// Debug diagnostics go to `tracing` when `enable_debug_log` is set.
    pub fn new(config: LinkerConfig, source: Arc<dyn MessageSource>) -> Result<Self, ConfigError> {
        let sink: Option<Arc<dyn DiagnosticSink>> = if config.enable_debug_log {
            Some(Arc::new(TracingSink))
        } else {
            None
        };
        Self::build(config, source, sink)
    }

    /// Create a linker with an explicit diagnostic sink.
    ///
    /// The sink receives the debug trail regardless of `enable_debug_log`.
    pub fn with_sink(
        config: LinkerConfig,
        source: Arc<dyn MessageSource>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, source, Some(sink))
    }

    fn build(
        config: LinkerConfig,
        source: Arc<dyn MessageSource>,
        sink: Option<Arc<dyn DiagnosticSink>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let logger = DebugLogger::new(source.origin(), sink);
        let pending = Arc::new(PendingRequestTable::new());
        let registry = Arc::new(ActionHandlerRegistry::new());
        let dispatcher = MessageDispatcher::new(
            HandlerInvoker::new(registry.clone()),
            ResponseResolver::new(pending.clone()),
            logger.clone(),
        );

        Ok(Self {
            inner: Arc::new(LinkerInner {
                config,
                source,
                pending,
                registry,
                dispatcher,
                logger,
                initialized: AtomicBool::new(false),
                requests_sent: AtomicU64::new(0),
                ignored_sent: AtomicU64::new(0),
            }),
        })
    }

    /// Install the inbound listener. Idempotent.
    ///
    /// Spawns the listener (and the sweep task, when enabled) on the current
    /// tokio runtime. Returns true only for the call that installed it;
    /// outside a runtime nothing is installed and false is returned.
    pub fn init(&self) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                origin = %self.origin(),
                "init() called outside a tokio runtime, listener not installed"
            );
            return false;
        };

        if self
            .inner
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let source = self.inner.source.clone();
        let dispatcher = self.inner.dispatcher.clone();
        let origin = source.origin().to_string();
        runtime.spawn(async move {
            while let Some(message) = source.next_message().await {
                dispatcher.dispatch(message);
            }
            debug!(origin = %origin, "Message source closed, listener stopped");
        });

        let sweep = &self.inner.config.sweep;
        if sweep.enabled {
            runtime.spawn(sweep_task(
                Arc::downgrade(&self.inner.pending),
                sweep.interval,
                sweep.retention,
            ));
        }

        info!(origin = %self.origin(), "Window linker initialized");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Serve `action_name` with an async handler. Replaces any previous one.
    pub fn listen<F, Fut>(&self, action_name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.inner
            .registry
            .register(action_name, async_handler(handler));
    }

    /// Serve `action_name` with a synchronous handler. Replaces any previous one.
    pub fn listen_sync<F>(&self, action_name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner
            .registry
            .register(action_name, sync_handler(handler));
    }

    pub fn has_handler(&self, action_name: &str) -> bool {
        self.inner.registry.contains(action_name)
    }

    /// Invoke `action_name` on the context behind `target`.
    ///
    /// With `ignore_return` the request is posted and `Ok(None)` returned at
    /// once. Otherwise resolves with the peer's result, or rejects with the
    /// peer's error message or a timeout.
    pub async fn send(
        &self,
        target: &dyn MessagePort,
        action_name: &str,
        payload: Value,
        options: SendOptions,
    ) -> LinkResult<Option<Value>> {
        let session_id = SessionId::new();
        let request = RequestEnvelope::new(
            session_id.clone(),
            action_name,
            Some(payload),
            options.ignore_return,
        );
        self.inner
            .logger
            .print("send request", &(&options, &request));
        let data = Envelope::from(request).encode()?;

        if options.ignore_return {
            target.post(data, &options.target_origin).await?;
            self.inner.ignored_sent.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let timeout = options.effective_timeout(&self.inner.config);
        let settled = self
            .inner
            .pending
            .register(session_id.clone(), action_name, timeout);

        if let Err(e) = target.post(data, &options.target_origin).await {
            self.inner.pending.cancel(&session_id);
            return Err(e.into());
        }
        self.inner.requests_sent.fetch_add(1, Ordering::Relaxed);

        settled.await.unwrap_or(Err(LinkError::Abandoned))
    }

    /// Typed form of [`send`](Self::send).
    pub async fn send_as<P, R>(
        &self,
        target: &dyn MessagePort,
        action_name: &str,
        payload: &P,
        options: SendOptions,
    ) -> LinkResult<Option<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload).map_err(LinkError::Payload)?;
        match self.send(target, action_name, payload, options).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(LinkError::Payload),
            None => Ok(None),
        }
    }

    /// Origin of the local context.
    pub fn origin(&self) -> &str {
        self.inner.source.origin()
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.inner.config
    }

    /// Entries in the pending table, including timed-out ones awaiting cleanup.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.pending_count()
    }

    pub fn stats(&self) -> LinkerStats {
        let pending = self.inner.pending.stats();
        let dispatch = self.inner.dispatcher.stats();
        LinkerStats {
            requests_sent: self.inner.requests_sent.load(Ordering::Relaxed),
            ignored_sent: self.inner.ignored_sent.load(Ordering::Relaxed),
            responses_settled: pending.total_completed.load(Ordering::Relaxed),
            remote_failures: pending.total_remote_failures.load(Ordering::Relaxed),
            timeouts: pending.total_timeouts.load(Ordering::Relaxed),
            late_responses: pending.total_late.load(Ordering::Relaxed),
            orphan_responses: pending.total_orphans.load(Ordering::Relaxed),
            swept: pending.total_swept.load(Ordering::Relaxed),
            messages_received: dispatch.total_received.load(Ordering::Relaxed),
            malformed_messages: dispatch.total_malformed.load(Ordering::Relaxed),
            responses_received: dispatch.total_responses.load(Ordering::Relaxed),
            requests_served: dispatch.total_requests.load(Ordering::Relaxed),
            replies_sent: dispatch.total_replies.load(Ordering::Relaxed),
            reply_errors: dispatch.total_reply_errors.load(Ordering::Relaxed),
            pending: self.inner.pending.pending_count(),
        }
    }
}
