use async_trait::async_trait;
use tungstenite::protocol::Message as WsMessage;

use crate::utils::error::UpstreamError;

/// A message published on the upstream backend.
///
/// The payload is opaque and forwarded to clients byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl UpstreamMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// The WebSocket frame carrying this payload: text when it is valid UTF-8,
    /// binary otherwise.
    pub fn frame(&self) -> WsMessage {
        match std::str::from_utf8(&self.payload) {
            Ok(text) => WsMessage::text(text.to_string()),
            Err(_) => WsMessage::binary(self.payload.clone()),
        }
    }
}

/// A publish/subscribe backend keyed by topic name.
///
/// Implementations deliver published messages as `UpstreamMessage`s into the
/// channel they were constructed with, for every topic currently subscribed.
#[async_trait]
pub trait UpstreamBackend: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<(), UpstreamError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), UpstreamError>;
}
