//! Response resolver - applies inbound responses to the pending table.

use crate::domain::envelope::ResponseEnvelope;
use crate::domain::error::{LinkError, UNKNOWN_ERROR_MESSAGE};
use crate::domain::pending::{PendingRequestTable, Resolution, Settlement};
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct ResponseResolver {
    pending: Arc<PendingRequestTable>,
}

impl ResponseResolver {
    pub fn new(pending: Arc<PendingRequestTable>) -> Self {
        Self { pending }
    }

    /// Settle the waiting `send` for this response, if any.
    pub fn resolve(&self, response: ResponseEnvelope) -> Resolution {
        let session_id = response.session_id.clone();
        self.pending.resolve(&session_id, settlement_of(response))
    }
}

/// Outcome a response settles its request with.
///
/// A success always carries a value; a missing or `null` result is
/// `Value::Null`, never `None` (which means "not waited for").
fn settlement_of(response: ResponseEnvelope) -> Settlement {
    if response.is_success {
        Ok(Some(response.origin_data.unwrap_or(Value::Null)))
    } else {
        Err(LinkError::Remote(
            response
                .error_message
                .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::envelope::Envelope;
    use crate::domain::session::SessionId;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_success_resolves_with_payload() {
        let table = Arc::new(PendingRequestTable::new());
        let resolver = ResponseResolver::new(table.clone());
        let id = SessionId::new();
        let rx = table.register(id.clone(), "echo", Duration::from_secs(30));

        let outcome = resolver.resolve(ResponseEnvelope::success(id, json!({"a": 1})));
        assert_eq!(outcome, Resolution::Settled);
        assert_eq!(rx.await.unwrap().unwrap(), Some(json!({"a": 1})));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_rejects_with_message() {
        let table = Arc::new(PendingRequestTable::new());
        let resolver = ResponseResolver::new(table.clone());
        let id = SessionId::new();
        let rx = table.register(id.clone(), "fail", Duration::from_secs(30));

        resolver.resolve(ResponseEnvelope::failure(id, "bad"));
        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_remote());
        assert_eq!(err.to_string(), "bad");
    }

    #[tokio::test]
    async fn test_failure_without_message_uses_fallback() {
        let table = Arc::new(PendingRequestTable::new());
        let resolver = ResponseResolver::new(table.clone());
        let id = SessionId::new();
        let rx = table.register(id.clone(), "fail", Duration::from_secs(30));

        let mut response = ResponseEnvelope::failure(id, "");
        response.error_message = None;
        resolver.resolve(response);
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), UNKNOWN_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_success_without_payload_resolves_null() {
        let table = Arc::new(PendingRequestTable::new());
        let resolver = ResponseResolver::new(table.clone());
        let id = SessionId::new();
        let rx = table.register(id.clone(), "unit", Duration::from_secs(30));

        // `"originData": null` decodes to an absent field
        let response = match Envelope::decode(&json!({
            "__type__": "__window_linker_response__",
            "sessionId": id.as_str(),
            "isSuccess": true,
            "originData": null,
        }))
        .unwrap()
        {
            Envelope::Response(response) => response,
            other => panic!("expected response, got {:?}", other),
        };
        assert_eq!(response.origin_data, None);

        assert_eq!(resolver.resolve(response), Resolution::Settled);
        assert_eq!(rx.await.unwrap().unwrap(), Some(Value::Null));
    }

    #[test]
    fn test_orphan_response() {
        let resolver = ResponseResolver::new(Arc::new(PendingRequestTable::new()));
        let outcome = resolver.resolve(ResponseEnvelope::success(SessionId::new(), json!(1)));
        assert_eq!(outcome, Resolution::Orphan);
    }
}
