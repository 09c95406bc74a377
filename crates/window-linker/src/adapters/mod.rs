//! Transport adapters.

pub mod channel;

pub use channel::{pair, ChannelContext, ChannelPort};
