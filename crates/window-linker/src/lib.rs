//! Window Linker - request/response over a fire-and-forget message channel.
//!
//! Two contexts that can only exchange structured messages (a page and an
//! embedded frame, say) use this crate to call named actions on each other
//! and get back a result, an error, or a timeout.
//!
//! # Architecture
//!
//! ```text
//!   context A                                         context B
//! ┌──────────────────────┐                      ┌──────────────────────┐
//! │ send()               │  request envelope    │ MessageDispatcher    │
//! │  ├─ SessionId        │ ───────────────────► │  └─ HandlerInvoker   │
//! │  ├─ PendingRequest-  │                      │      └─ ActionHandler│
//! │  │   Table (+timer)  │  response envelope   │         Registry     │
//! │  └─ await            │ ◄─────────────────── │                      │
//! │ MessageDispatcher    │                      │                      │
//! │  └─ ResponseResolver │                      │                      │
//! └──────────────────────┘                      └──────────────────────┘
//! ```
//!
//! Each `send` settles exactly once: either a matching response or its
//! timer gets there first, and the loser is a no-op.
//!
//! # Usage
//!
//! ```ignore
//! use window_linker::{adapters::channel, LinkerConfig, SendOptions, WindowLinker};
//!
//! let (parent, child) = channel::pair("http://parent", "http://child");
//! let (parent, child) = (Arc::new(parent), Arc::new(child));
//!
//! let child_linker = WindowLinker::new(LinkerConfig::default(), child.clone())?;
//! child_linker.init();
//! child_linker.listen_sync("echo", |data| Ok(data));
//!
//! let parent_linker = WindowLinker::new(LinkerConfig::default(), parent.clone())?;
//! parent_linker.init();
//! let reply = parent_linker
//!     .send(parent.port().as_ref(), "echo", json!({"a": 1}), SendOptions::default())
//!     .await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod diagnostics;
pub mod domain;
pub mod ipc;
pub mod ports;
pub mod service;
pub mod telemetry;

// Re-exports for public API
pub use diagnostics::{DiagnosticSink, MemorySink, TracingSink};
pub use domain::config::{LinkerConfig, SendOptions, SweepConfig};
pub use domain::envelope::{Envelope, RequestEnvelope, ResponseEnvelope};
pub use domain::error::{EnvelopeError, LinkError, LinkResult, TransportError};
pub use domain::registry::HandlerResult;
pub use domain::session::SessionId;
pub use domain::types::TargetOrigin;
pub use ports::{InboundMessage, MessagePort, MessageSource};
pub use service::{LinkerStats, WindowLinker};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
