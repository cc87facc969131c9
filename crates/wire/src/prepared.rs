//! An immutable, pre-encoded outbound frame safe to share and enqueue onto
//! many recipients without re-encoding — the basis of [`crate`]'s broadcast
//! fan-out cost model (one encode, N enqueues).

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PreparedPayload(Arc<str>);

impl PreparedPayload {
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self(serde_json::to_string(value)?.into()))
    }

    pub fn from_json_string(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_arc(self) -> Arc<str> {
        self.0
    }
}
