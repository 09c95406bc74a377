//! Domain types for the linker.
//!
//! Wire envelopes, session ids, configuration, errors and the two
//! per-instance tables (pending requests and action handlers).

pub mod config;
pub mod envelope;
pub mod error;
pub mod pending;
pub mod registry;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use config::{ConfigError, LinkerConfig, SendOptions, SweepConfig, DEFAULT_TIMEOUT};
pub use envelope::{Envelope, RequestEnvelope, ResponseEnvelope};
pub use error::{EnvelopeError, LinkError, LinkResult, TransportError};
pub use pending::{PendingRequestTable, PendingStats, Resolution, Settlement};
pub use registry::{ActionHandler, ActionHandlerRegistry, HandlerResult};
pub use session::SessionId;
pub use types::TargetOrigin;
