//! Inbound handling: dispatch, handler invocation and response resolution.

pub mod dispatcher;
pub mod invoker;
pub mod resolver;

pub use dispatcher::{DispatchStats, Dispatched, MessageDispatcher};
pub use invoker::HandlerInvoker;
pub use resolver::ResponseResolver;
