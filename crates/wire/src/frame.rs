//! Wire frame shapes.
//!
//! Grounded on the original `conn.go`'s `RawMessage`/`Message` pair, adapted
//! to the `cmd: int16` / `id: uint32` wire shape this framework uses (rather
//! than the string method names a later rewrite of the upstream project
//! used). `id` is held in a `Cell` so the router can clear it in place once a
//! handler has answered a request, mirroring the original mutating `m.Id`
//! directly — see [`RawMessage::take_id`].

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound frame, as decoded off the socket.
#[derive(Debug, Deserialize)]
pub struct RawMessage {
    pub cmd: i16,
    #[serde(default)]
    id: Cell<u32>,
    #[serde(default)]
    pub data: Value,
}

impl RawMessage {
    pub fn new(cmd: i16, id: u32, data: Value) -> Self {
        Self {
            cmd,
            id: Cell::new(id),
            data,
        }
    }

    pub fn id(&self) -> u32 {
        self.id.get()
    }

    /// True when this frame obliges the dispatch layer to answer with a
    /// correlated response.
    pub fn wants_response(&self) -> bool {
        self.id.get() != 0
    }

    /// Clear the id, marking this request as answered. Returns the id that
    /// was cleared (0 if it was already answered, or never a request).
    pub fn take_id(&self) -> u32 {
        let id = self.id.get();
        self.id.set(0);
        id
    }
}

/// An outbound frame. `cmd` is absent for correlated responses; `id` is
/// nonzero only when correlating to a request.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<i16>,
    #[serde(skip_serializing_if = "is_zero")]
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn is_zero(id: &u32) -> bool {
    *id == 0
}

impl Message {
    /// A fire-and-forget push to the client.
    pub fn push(cmd: i16, data: impl Into<Option<Value>>) -> Self {
        Self {
            cmd: Some(cmd),
            id: 0,
            data: data.into(),
        }
    }

    /// A response correlated to a prior request.
    pub fn response(id: u32, data: impl Into<Option<Value>>) -> Self {
        Self {
            cmd: None,
            id,
            data: data.into(),
        }
    }

    /// The router's synthesised reply when a handler answered a request
    /// without sending one itself.
    pub fn empty_response(id: u32) -> Self {
        Self {
            cmd: None,
            id,
            data: None,
        }
    }

    /// A chat/info frame: `{"cmd": ChatMessage, "data": {"type": kind, "message": text}}`.
    pub fn info(chat_cmd: i16, kind: i32, text: impl Into<String>) -> Self {
        Self {
            cmd: Some(chat_cmd),
            id: 0,
            data: Some(serde_json::json!({ "type": kind, "message": text.into() })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_id_clears_once() {
        let m = RawMessage::new(1, 42, Value::Null);
        assert_eq!(m.take_id(), 42);
        assert_eq!(m.take_id(), 0);
        assert!(!m.wants_response());
    }

    #[test]
    fn push_omits_id_and_response_omits_cmd() {
        let push = Message::push(5, Some(serde_json::json!({"a":1})));
        let encoded = serde_json::to_value(&push).unwrap();
        assert!(encoded.get("id").is_none());
        assert_eq!(encoded["cmd"], 5);

        let resp = Message::response(7, None);
        let encoded = serde_json::to_value(&resp).unwrap();
        assert!(encoded.get("cmd").is_none());
        assert_eq!(encoded["id"], 7);
    }
}
