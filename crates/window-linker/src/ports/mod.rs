//! Ports at the transport boundary.

pub mod transport;

pub use transport::{InboundMessage, MessagePort, MessageSource};
