use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::upstream::backend::{UpstreamBackend, UpstreamMessage};
use crate::utils::error::UpstreamError;

/// In-process backend. `publish` stands in for an external publisher and only
/// delivers on topics that are currently subscribed, like a real pub/sub server.
#[derive(Debug)]
pub struct MemoryBackend {
    active: Mutex<HashSet<String>>,
    sink: UnboundedSender<UpstreamMessage>,
}

impl MemoryBackend {
    pub fn new(sink: UnboundedSender<UpstreamMessage>) -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            sink,
        }
    }

    fn active(&self) -> MutexGuard<'_, HashSet<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.active().contains(topic)
    }

    pub fn active_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.active().iter().cloned().collect();
        topics.sort();
        topics
    }

    /// Publishes `payload` on `topic`. Returns whether it was delivered.
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        if !self.is_subscribed(topic) {
            return false;
        }
        self.sink
            .send(UpstreamMessage::new(topic, payload))
            .is_ok()
    }
}

#[async_trait]
impl UpstreamBackend for MemoryBackend {
    async fn subscribe(&self, topic: &str) -> Result<(), UpstreamError> {
        if self.sink.is_closed() {
            return Err(UpstreamError::Unavailable("message sink closed".into()));
        }
        self.active().insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), UpstreamError> {
        self.active().remove(topic);
        Ok(())
    }
}
