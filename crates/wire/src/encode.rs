//! Offload-aware outbound encoding: serialise a [`Message`], and if its
//! `data` would make the frame too large to put on the wire inline, deposit
//! `data` in a [`MessageStore`] and replace it with an `{"httpid": ...}`
//! pointer instead.

use std::sync::Arc;

use crate::error::Result;
use crate::frame::Message;
use crate::offload::{MessageStore, OFFLOAD_THRESHOLD};
use crate::prepared::PreparedPayload;

/// Encode `message` into a [`PreparedPayload`], offloading `data` through
/// `store` if the encoded frame exceeds [`OFFLOAD_THRESHOLD`].
pub fn encode_outbound(message: &Message, store: &Arc<MessageStore>) -> Result<PreparedPayload> {
    let encoded = serde_json::to_string(message)?;
    if encoded.len() <= OFFLOAD_THRESHOLD {
        return Ok(PreparedPayload::from_json_string(encoded));
    }

    let data_bytes = match &message.data {
        Some(data) => serde_json::to_vec(data)?,
        None => return Ok(PreparedPayload::from_json_string(encoded)),
    };
    let id = store.put(data_bytes);

    let offloaded = Message {
        cmd: message.cmd,
        id: message.id,
        data: Some(serde_json::json!({ "httpid": id.to_string() })),
    };
    PreparedPayload::encode(&offloaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn small_payload_is_sent_inline() {
        let store = MessageStore::new();
        let msg = Message::push(1, Some(serde_json::json!({"a": 1})));
        let prepared = encode_outbound(&msg, &store).unwrap();
        assert!(prepared.as_str().contains("\"a\":1"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn oversized_payload_is_offloaded() {
        let store = MessageStore::new();
        let big = "x".repeat(OFFLOAD_THRESHOLD + 10);
        let msg = Message::push(1, Some(serde_json::json!({"blob": big})));
        let prepared = encode_outbound(&msg, &store).unwrap();
        assert!(prepared.as_str().contains("httpid"));
        assert_eq!(store.len(), 1);
    }
}
