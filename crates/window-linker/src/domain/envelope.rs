//! Wire envelopes exchanged between linked contexts.
//!
//! Field names and tag literals are the interop contract with any peer
//! implementation and must not change:
//!
//! ```text
//! request:  { "__type__": "__window_linker_request__",  "sessionId", "actionName", "isIgnoreReturn", "originData"? }
//! response: { "__type__": "__window_linker_response__", "sessionId", "isSuccess", "errorMessage"?, "originData"? }
//! ```

use crate::domain::error::EnvelopeError;
use crate::domain::session::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the discriminating field.
pub const TAG_FIELD: &str = "__type__";

/// Tag literal for request envelopes.
pub const REQUEST_TAG: &str = "__window_linker_request__";

/// Tag literal for response envelopes.
pub const RESPONSE_TAG: &str = "__window_linker_response__";

/// A tagged message travelling over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type__")]
pub enum Envelope {
    #[serde(rename = "__window_linker_request__")]
    Request(RequestEnvelope),
    #[serde(rename = "__window_linker_response__")]
    Response(ResponseEnvelope),
}

/// Invocation of a named action on the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub session_id: SessionId,
    pub action_name: String,
    /// Sender will not wait for the outcome
    pub is_ignore_return: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_data: Option<Value>,
}

/// Terminal outcome for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub session_id: SessionId,
    pub is_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_data: Option<Value>,
}

impl RequestEnvelope {
    pub fn new(
        session_id: SessionId,
        action_name: impl Into<String>,
        payload: Option<Value>,
        is_ignore_return: bool,
    ) -> Self {
        Self {
            session_id,
            action_name: action_name.into(),
            is_ignore_return,
            origin_data: payload,
        }
    }
}

impl ResponseEnvelope {
    /// Successful outcome carrying the handler's result.
    pub fn success(session_id: SessionId, result: Value) -> Self {
        Self {
            session_id,
            is_success: true,
            error_message: None,
            origin_data: Some(result),
        }
    }

    /// Failed outcome carrying a message-only error.
    pub fn failure(session_id: SessionId, message: impl Into<String>) -> Self {
        Self {
            session_id,
            is_success: false,
            error_message: Some(message.into()),
            origin_data: None,
        }
    }
}

impl Envelope {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Envelope::Request(req) => &req.session_id,
            Envelope::Response(resp) => &resp.session_id,
        }
    }

    /// Encode into the transport's structured value.
    pub fn encode(&self) -> Result<Value, EnvelopeError> {
        serde_json::to_value(self).map_err(EnvelopeError::Encode)
    }

    /// Classify and decode an inbound value.
    ///
    /// Values that are not objects, lack a tag, or carry a foreign tag are
    /// rejected before field decoding so they can be ignored cheaply.
    pub fn decode(data: &Value) -> Result<Self, EnvelopeError> {
        let tag = data
            .get(TAG_FIELD)
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingTag)?;

        if tag != REQUEST_TAG && tag != RESPONSE_TAG {
            return Err(EnvelopeError::UnknownTag(tag.to_string()));
        }

        serde_json::from_value(data.clone()).map_err(EnvelopeError::InvalidFields)
    }
}

impl From<RequestEnvelope> for Envelope {
    fn from(req: RequestEnvelope) -> Self {
        Envelope::Request(req)
    }
}

impl From<ResponseEnvelope> for Envelope {
    fn from(resp: ResponseEnvelope) -> Self {
        Envelope::Response(resp)
    }
}
