//! Handler invocation for inbound requests.
//!
//! Turns a request into at most one response envelope. Handler errors and
//! panics are converted to failure responses here; nothing raw crosses the
//! boundary.

use crate::domain::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::domain::error::{handler_not_found_message, UNKNOWN_ERROR_MESSAGE};
use crate::domain::registry::ActionHandlerRegistry;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs registered handlers for inbound requests.
#[derive(Clone)]
pub struct HandlerInvoker {
    registry: Arc<ActionHandlerRegistry>,
}

impl HandlerInvoker {
    pub fn new(registry: Arc<ActionHandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Invoke the handler for `request`.
    ///
    /// A missing handler always yields a failure response, even when the
    /// sender asked to ignore the return. Otherwise `None` is returned for
    /// ignore-return requests regardless of the handler's outcome.
    pub async fn invoke(&self, request: RequestEnvelope) -> Option<ResponseEnvelope> {
        let RequestEnvelope {
            session_id,
            action_name,
            is_ignore_return,
            origin_data,
        } = request;

        let Some(handler) = self.registry.get(&action_name) else {
            warn!(
                session_id = %session_id,
                action = %action_name,
                "No handler registered for action"
            );
            return Some(ResponseEnvelope::failure(
                session_id,
                handler_not_found_message(&action_name),
            ));
        };

        let payload = origin_data.unwrap_or(Value::Null);
        // The call itself sits inside the guarded future so a panic while
        // building the handler's future is caught as well
        let outcome = AssertUnwindSafe(async move { handler(payload).await })
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(error_message(&err)),
            Err(panic) => Err(panic_message(panic.as_ref())),
        };

        if is_ignore_return {
            if let Err(message) = &result {
                debug!(
                    session_id = %session_id,
                    action = %action_name,
                    error = %message,
                    "Handler failed for ignore-return request"
                );
            }
            return None;
        }

        match result {
            Ok(value) => Some(ResponseEnvelope::success(session_id, value)),
            Err(message) => {
                debug!(
                    session_id = %session_id,
                    action = %action_name,
                    error = %message,
                    "Handler failed"
                );
                Some(ResponseEnvelope::failure(session_id, message))
            }
        }
    }
}

/// Message carried back to the peer for a failed handler.
pub fn error_message(err: &anyhow::Error) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        String::new()
    };

    if message.trim().is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}
