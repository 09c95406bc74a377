//! Pending Request Table - continuation records for outstanding sends.
//!
//! Maps session IDs to the one-shot slot that settles a `send` future.
//!
//! Flow:
//! 1. `send` calls `register()`, which stores the entry and arms its timer
//! 2. The request envelope goes out over the transport
//! 3. Either the resolver calls `resolve()` or the timer calls `expire()`
//! 4. Whichever runs first takes the continuation; the other is a no-op
//!
//! A timed-out entry stays in the table (flagged) until its late response
//! arrives or `sweep_timed_out()` reclaims it.

use crate::domain::error::{LinkError, LinkResult};
use crate::domain::session::SessionId;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Terminal value delivered to a waiting `send`.
pub type Settlement = LinkResult<Option<Value>>;

/// A request waiting for its response or its timeout
struct PendingRequest {
    /// Taken by whichever of {resolver, timer} settles first
    continuation: Option<oneshot::Sender<Settlement>>,
    /// Timeout task, aborted on resolution
    timer: Option<AbortHandle>,
    /// Set by the timer; a later response only removes the entry
    timed_out: bool,
    /// When the timer fired
    timed_out_at: Option<Instant>,
    /// When the request was registered
    created_at: Instant,
    /// Action name (for logging)
    action: String,
    /// Configured window for this request
    timeout: Duration,
}

/// How an inbound response was applied to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The waiting `send` was settled with the response
    Settled,
    /// No entry for the session id
    Orphan,
    /// Entry had already timed out; response discarded and entry removed
    LateAfterTimeout,
    /// Entry was live but the caller stopped waiting
    CallerGone,
}

/// Statistics for the pending request table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total requests settled by a response
    pub total_completed: AtomicU64,
    /// Responses that settled their request with a remote failure
    pub total_remote_failures: AtomicU64,
    /// Total requests settled by their timer
    pub total_timeouts: AtomicU64,
    /// Responses that arrived after their timer fired
    pub total_late: AtomicU64,
    /// Responses with no matching entry
    pub total_orphans: AtomicU64,
    /// Entries removed without settlement (caller gone or send failed)
    pub total_cancelled: AtomicU64,
    /// Timed-out entries reclaimed by the sweep
    pub total_swept: AtomicU64,
}

/// Per-instance table of outstanding requests.
#[derive(Default)]
pub struct PendingRequestTable {
    /// Map of session ID to pending request
    pending: DashMap<SessionId, PendingRequest>,
    /// Statistics
    stats: PendingStats,
}

impl PendingRequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and arm its timeout.
    ///
    /// Returns the receiver the caller awaits. The timer holds only a weak
    /// reference, so dropping the table disarms every outstanding timer.
    pub fn register(
        self: &Arc<Self>,
        session_id: SessionId,
        action: &str,
        timeout: Duration,
    ) -> oneshot::Receiver<Settlement> {
        let (tx, rx) = oneshot::channel();

        self.pending.insert(
            session_id.clone(),
            PendingRequest {
                continuation: Some(tx),
                timer: None,
                timed_out: false,
                timed_out_at: None,
                created_at: Instant::now(),
                action: action.to_string(),
                timeout,
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        let table: Weak<Self> = Arc::downgrade(self);
        let timer_id = session_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(table) = table.upgrade() {
                table.expire(&timer_id);
            }
        });

        if let Some(mut entry) = self.pending.get_mut(&session_id) {
            entry.timer = Some(timer.abort_handle());
        }

        debug!(
            session_id = %session_id,
            action = action,
            timeout_ms = timeout.as_millis(),
            "Registered pending request"
        );

        rx
    }

    /// Timer callback: settle with a timeout error and flag the entry.
    ///
    /// The entry is not removed. Returns true if this call settled it.
    pub fn expire(&self, session_id: &SessionId) -> bool {
        let Some(mut entry) = self.pending.get_mut(session_id) else {
            return false;
        };
        if entry.timed_out {
            return false;
        }
        let Some(continuation) = entry.continuation.take() else {
            return false;
        };

        entry.timed_out = true;
        entry.timed_out_at = Some(Instant::now());
        entry.timer = None;
        let timeout = entry.timeout;
        self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);

        warn!(
            session_id = %session_id,
            action = %entry.action,
            timeout_ms = timeout.as_millis(),
            "Pending request timed out"
        );

        // Receiver may already be gone; the outcome is the same
        let _ = continuation.send(Err(LinkError::Timeout { timeout }));
        true
    }

    /// Apply an inbound response to its entry.
    pub fn resolve(&self, session_id: &SessionId, outcome: Settlement) -> Resolution {
        let Some((_, mut entry)) = self.pending.remove(session_id) else {
            self.stats.total_orphans.fetch_add(1, Ordering::Relaxed);
            error!(
                session_id = %session_id,
                "Response for unknown session ID, discarding"
            );
            return Resolution::Orphan;
        };

        if entry.timed_out {
            self.stats.total_late.fetch_add(1, Ordering::Relaxed);
            error!(
                session_id = %session_id,
                action = %entry.action,
                "Response arrived after timeout, discarding"
            );
            return Resolution::LateAfterTimeout;
        }

        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }

        let response_time = entry.created_at.elapsed();
        let failed = outcome.is_err();
        let delivered = entry
            .continuation
            .take()
            .map(|tx| tx.send(outcome).is_ok())
            .unwrap_or(false);

        if delivered {
            self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
            if failed {
                self.stats
                    .total_remote_failures
                    .fetch_add(1, Ordering::Relaxed);
            }
            debug!(
                session_id = %session_id,
                action = %entry.action,
                response_time_ms = response_time.as_millis(),
                "Settled pending request"
            );
            Resolution::Settled
        } else {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(
                session_id = %session_id,
                action = %entry.action,
                "Pending request receiver dropped"
            );
            Resolution::CallerGone
        }
    }

    /// Remove an entry without settling it (e.g. the post failed).
    pub fn cancel(&self, session_id: &SessionId) -> bool {
        if let Some((_, mut entry)) = self.pending.remove(session_id) {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Reclaim timed-out entries older than `retention`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_timed_out(&self, retention: Duration) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, request| match request.timed_out_at {
            Some(at) if request.timed_out && now.duration_since(at) >= retention => {
                debug!(
                    session_id = %id,
                    action = %request.action,
                    "Sweeping timed-out pending request"
                );
                removed += 1;
                false
            }
            _ => true,
        });

        self.stats
            .total_swept
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Get number of entries in the table (live and timed out)
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a session ID has an entry
    pub fn is_pending(&self, session_id: &SessionId) -> bool {
        self.pending.contains_key(session_id)
    }

    /// `Some(true)` if the entry exists and its timer has fired.
    pub fn is_timed_out(&self, session_id: &SessionId) -> Option<bool> {
        self.pending.get(session_id).map(|entry| entry.timed_out)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

/// Background task that reclaims timed-out entries.
///
/// Exits once the table has been dropped.
pub async fn sweep_task(table: Weak<PendingRequestTable>, interval: Duration, retention: Duration) {
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let Some(table) = table.upgrade() else {
            debug!("Pending table dropped, stopping sweep task");
            break;
        };
        let removed = table.sweep_timed_out(retention);
        if removed > 0 {
            debug!(removed = removed, "Swept timed-out pending requests");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let table = Arc::new(PendingRequestTable::new());
        let id = SessionId::new();

        let rx = table.register(id.clone(), "echo", Duration::from_secs(30));
        assert!(table.is_pending(&id));
        assert_eq!(table.pending_count(), 1);

        let outcome = table.resolve(&id, Ok(Some(json!("hello"))));
        assert_eq!(outcome, Resolution::Settled);

        let settled = rx.await.unwrap().unwrap();
        assert_eq!(settled, Some(json!("hello")));
        assert_eq!(table.pending_count(), 0);
        assert_eq!(table.stats().total_completed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_orphan() {
        let table = PendingRequestTable::new();
        let outcome = table.resolve(&SessionId::new(), Ok(None));
        assert_eq!(outcome, Resolution::Orphan);
        assert_eq!(table.stats().total_orphans.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_flags_but_keeps_entry() {
        let table = Arc::new(PendingRequestTable::new());
        let id = SessionId::new();

        let rx = table.register(id.clone(), "slow", Duration::from_millis(100));
        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_timeout());

        assert!(table.is_pending(&id));
        assert_eq!(table.is_timed_out(&id), Some(true));
        assert_eq!(table.stats().total_timeouts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_removes_timed_out_entry() {
        let table = Arc::new(PendingRequestTable::new());
        let id = SessionId::new();

        let rx = table.register(id.clone(), "slow", Duration::from_millis(100));
        assert!(rx.await.unwrap().is_err());

        let outcome = table.resolve(&id, Ok(Some(json!(1))));
        assert_eq!(outcome, Resolution::LateAfterTimeout);
        assert!(!table.is_pending(&id));

        // A duplicate of the late response is now an orphan
        assert_eq!(table.resolve(&id, Ok(None)), Resolution::Orphan);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolution_disarms_timer() {
        let table = Arc::new(PendingRequestTable::new());
        let id = SessionId::new();

        let rx = table.register(id.clone(), "fast", Duration::from_millis(100));
        assert_eq!(
            table.resolve(&id, Err(LinkError::Remote("bad".into()))),
            Resolution::Settled
        );
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "bad");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(table.stats().total_timeouts.load(Ordering::Relaxed), 0);
        assert!(!table.expire(&id));
    }

    #[tokio::test]
    async fn test_expire_settles_only_once() {
        let table = Arc::new(PendingRequestTable::new());
        let id = SessionId::new();

        let _rx = table.register(id.clone(), "x", Duration::from_secs(30));
        assert!(table.expire(&id));
        assert!(!table.expire(&id));
        assert_eq!(table.stats().total_timeouts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_caller_gone() {
        let table = Arc::new(PendingRequestTable::new());
        let id = SessionId::new();

        let rx = table.register(id.clone(), "x", Duration::from_secs(30));
        drop(rx);
        assert_eq!(table.resolve(&id, Ok(None)), Resolution::CallerGone);
        assert_eq!(table.stats().total_cancelled.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_cancel() {
        let table = Arc::new(PendingRequestTable::new());
        let id = SessionId::new();

        let _rx = table.register(id.clone(), "x", Duration::from_secs(30));
        assert!(table.cancel(&id));
        assert!(!table.is_pending(&id));
        assert!(!table.cancel(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_only_reclaims_old_timed_out_entries() {
        let table = Arc::new(PendingRequestTable::new());
        let expired = SessionId::new();
        let live = SessionId::new();

        let rx = table.register(expired.clone(), "slow", Duration::from_millis(10));
        let _live_rx = table.register(live.clone(), "slow", Duration::from_secs(3600));
        assert!(rx.await.unwrap().is_err());

        // Still inside the grace period
        assert_eq!(table.sweep_timed_out(Duration::from_secs(1)), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(table.sweep_timed_out(Duration::from_secs(1)), 1);
        assert!(!table.is_pending(&expired));
        assert!(table.is_pending(&live));
        assert_eq!(table.stats().total_swept.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_stops_when_table_dropped() {
        let table = Arc::new(PendingRequestTable::new());
        let task = tokio::spawn(sweep_task(
            Arc::downgrade(&table),
            Duration::from_millis(10),
            Duration::from_millis(10),
        ));
        drop(table);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sweep task exits")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_entries() {
        let table = Arc::new(PendingRequestTable::new());
        let a = SessionId::new();
        let b = SessionId::new();

        let rx_a = table.register(a.clone(), "a", Duration::from_secs(30));
        let rx_b = table.register(b.clone(), "b", Duration::from_millis(50));

        table.resolve(&a, Ok(Some(json!("A"))));
        assert_eq!(rx_a.await.unwrap().unwrap(), Some(json!("A")));
        assert!(rx_b.await.unwrap().unwrap_err().is_timeout());
    }
}
