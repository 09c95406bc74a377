//! Debug diagnostics as an injected collaborator.
//!
//! Protocol warnings always go through `tracing`. The verbose per-message
//! trail (every inbound event, every request sent) goes through a
//! `DiagnosticSink`, which exists only when `enable_debug_log` is set or a
//! sink is injected explicitly.

use std::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

/// `tracing` target used by [`TracingSink`].
pub const DEBUG_TARGET: &str = "window_linker::debug";

/// Receiver for verbose diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic event emitted by the context at `origin`.
    fn record(&self, origin: &str, event: &str, detail: &dyn fmt::Debug);
}

/// Default sink: `tracing::debug!` under [`DEBUG_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, origin: &str, event: &str, detail: &dyn fmt::Debug) {
        tracing::debug!(target: DEBUG_TARGET, origin = origin, detail = ?detail, "{}", event);
    }
}

/// Sink that keeps every event in memory, e.g. to show in a host UI.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

/// One captured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub origin: String,
    pub event: String,
    pub detail: String,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    /// Events whose name matches `event`.
    pub fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event == event)
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, origin: &str, event: &str, detail: &dyn fmt::Debug) {
        let mut events = self.events.lock();
        events.push(DiagnosticEvent {
            origin: origin.to_string(),
            event: event.to_string(),
            detail: format!("{:?}", detail),
        });
    }
}

/// Optional sink bound to the local origin.
#[derive(Clone)]
pub struct DebugLogger {
    origin: String,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl DebugLogger {
    pub fn new(origin: impl Into<String>, sink: Option<Arc<dyn DiagnosticSink>>) -> Self {
        Self {
            origin: origin.into(),
            sink,
        }
    }

    /// Logger that drops everything.
    pub fn disabled(origin: impl Into<String>) -> Self {
        Self::new(origin, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn print(&self, event: &str, detail: &dyn fmt::Debug) {
        if let Some(sink) = &self.sink {
            sink.record(&self.origin, event, detail);
        }
    }
}

impl fmt::Debug for DebugLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugLogger")
            .field("origin", &self.origin)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_logger_records_nothing() {
        let logger = DebugLogger::disabled("http://a");
        assert!(!logger.is_enabled());
        logger.print("message event", &"ignored");
    }

    #[test]
    fn test_memory_sink_captures_origin() {
        let sink = Arc::new(MemorySink::new());
        let logger = DebugLogger::new("http://a", Some(sink.clone() as Arc<dyn DiagnosticSink>));
        logger.print("send request", &("echo", 1));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].origin, "http://a");
        assert_eq!(events[0].event, "send request");
        assert_eq!(events[0].detail, "(\"echo\", 1)");
        assert_eq!(sink.count("send request"), 1);
    }

    #[test]
    fn test_memory_sink_survives_panicking_detail() {
        struct Exploding;
        impl fmt::Debug for Exploding {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                panic!("debug impl exploded");
            }
        }

        let sink = MemorySink::new();
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sink.record("http://a", "boom", &Exploding);
        }));
        assert!(panicked.is_err());

        // A panic while recording must not lose later events
        sink.record("http://a", "message event", &1);
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.count("message event"), 1);
    }
}
