//! Duplex frame shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One JSON text message on the gateway connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "req")]
    Request(RequestFrame),

    #[serde(rename = "res")]
    Response(ResponseFrame),

    #[serde(rename = "event")]
    Event(EventFrame),
}

impl Frame {
    /// Parse one text message. Anything that is not a well-formed frame is `None`.
    pub fn parse(text: &str) -> Option<Frame> {
        serde_json::from_str(text).ok()
    }
}

/// Client-initiated call. `id` is unique among in-flight calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestFrame {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Reply to exactly one [`RequestFrame`], matched by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn success(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, code: &str, message: &str) -> Self {
        Self {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(ErrorShape {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// Error body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrorShape {
    #[serde(default, alias = "kind")]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Server push. Unordered with respect to requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    #[serde(rename = "event", alias = "name")]
    pub name: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "sequence")]
    pub seq: Option<u64>,
    #[serde(
        rename = "stateVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_version: Option<Value>,
}

/// What event handlers receive: the event name and its opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    pub name: String,
    pub payload: Value,
    pub seq: Option<u64>,
}

impl From<EventFrame> for GatewayEvent {
    fn from(frame: EventFrame) -> Self {
        Self {
            name: frame.name,
            payload: frame.payload,
            seq: frame.seq,
        }
    }
}
