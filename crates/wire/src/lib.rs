//! Wire-level types shared between the connection layer and its handlers:
//! frame shapes, command code spaces, prepared payloads, offload-aware
//! encoding, and the large-message offload store.

pub mod codes;
pub mod encode;
pub mod error;
pub mod frame;
pub mod offload;
pub mod prepared;

pub use encode::encode_outbound;
pub use error::{Error, Result};
pub use frame::{Message, RawMessage};
pub use offload::{MessageStore, OFFLOAD_THRESHOLD, OFFLOAD_TTL};
pub use prepared::PreparedPayload;
