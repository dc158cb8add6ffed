//! Wire types for the page-scope message channel.
//!
//! Everything that crosses the page/mediating-context boundary is one of the
//! [`PageMessage`] variants, serialized with a `type` tag in `snake_case`.
//! The service-side request/response shapes live here too so the dispatcher
//! and relay agree on a single canonical serialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a posted message came from, as seen by a listener on the page's
/// global scope. Listeners must ignore postings from foreign frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// The page's own scope (page context or the mediating context attached
    /// to the same document).
    PageScope,
    /// A different frame sharing the event target. Never trusted.
    ForeignFrame,
}

/// A message plus its posting origin, as delivered to scope listeners.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: MessageOrigin,
    pub message: PageMessage,
}

impl Envelope {
    #[must_use]
    pub const fn new(origin: MessageOrigin, message: PageMessage) -> Self {
        Self { origin, message }
    }
}

/// Messages carried over the page-scope channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageMessage {
    /// Page context asks the mediating context to perform a privileged call.
    CallRequest(CallRequest),
    /// Mediating context answers a previously posted request.
    CallResponse(CallResponse),
    /// Fire-and-forget error report. No correlation id, no response.
    ErrorReport(ErrorReport),
}

/// A privileged call on its way from the page to the mediating context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRequest {
    /// Identity of the calling script, attached by the dispatcher; callers
    /// never supply it themselves.
    pub caller_id: String,
    /// Extension/session identity the request is addressed to.
    pub origin_id: String,
    /// Pairs this request with its eventual response. Unique per dispatcher
    /// instance, not globally.
    pub correlation_id: String,
    /// Action tag from the closed service catalog.
    pub action: String,
    /// Opaque structured payload.
    pub payload: Value,
}

/// The answer to one [`CallRequest`], matched by correlation id.
///
/// Exactly one of `result`/`error` is meaningful; `error` wins if both are
/// present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallResponse {
    pub origin_id: String,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallResponse {
    /// Successful response carrying `result` (possibly `null`).
    #[must_use]
    pub const fn ok(origin_id: String, correlation_id: String, result: Option<Value>) -> Self {
        Self {
            origin_id,
            correlation_id,
            result,
            error: None,
        }
    }

    /// Error response.
    #[must_use]
    pub fn err(origin_id: String, correlation_id: String, error: impl Into<String>) -> Self {
        Self {
            origin_id,
            correlation_id,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Fire-and-forget error report from a user script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReport {
    /// Identity of the script that produced the error.
    pub caller_id: String,
    pub error: String,
}

/// Request shape forwarded to the extension-owned service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRequest {
    /// Action tag from the closed catalog. Services reject unknown tags
    /// with an explicit error.
    pub action: String,
    /// Identity of the originating script, attached by the dispatcher so
    /// callers never supply it themselves.
    pub caller_id: String,
    /// Opaque structured payload.
    pub payload: Value,
}

/// Response shape returned by the extension-owned service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceResponse {
    #[must_use]
    pub const fn ok(result: Option<Value>) -> Self {
        Self {
            result,
            error: None,
        }
    }

    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_request_wire_format_is_type_tagged() {
        let message = PageMessage::CallRequest(CallRequest {
            caller_id: "script-a".to_string(),
            origin_id: "ext-1".to_string(),
            correlation_id: "script-a:1".to_string(),
            action: "value_get".to_string(),
            payload: json!({ "key": "count" }),
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "call_request");
        assert_eq!(value["caller_id"], "script-a");
        assert_eq!(value["origin_id"], "ext-1");
        assert_eq!(value["correlation_id"], "script-a:1");
    }

    #[test]
    fn call_response_roundtrips_without_absent_fields() {
        let message = PageMessage::CallResponse(CallResponse::ok(
            "ext-1".to_string(),
            "script-a:1".to_string(),
            Some(json!(42)),
        ));
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("error").is_none());

        let parsed: PageMessage = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let raw = json!({ "type": "not_a_real_message", "payload": {} });
        assert!(serde_json::from_value::<PageMessage>(raw).is_err());
    }
}
