//! Upstream subscription manager
//!
//! Called once per registry transition: `on_created` when a topic gains its
//! first local subscriber, `on_emptied` when it loses its last one. Failures
//! are logged and never undo the registry change. The default topic is
//! pinned: subscribed once at startup and left alone afterwards.
//!
//! Every attempt is bounded by `call_timeout`. The relay holds its registry
//! lock across these calls, so an unbounded call would stall fan-out too.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::upstream::backend::UpstreamBackend;
use crate::upstream::retry::{NoRetry, RetryPolicy};
use crate::utils::error::UpstreamError;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Subscribe,
    Unsubscribe,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Subscribe => f.write_str("subscribe"),
            Op::Unsubscribe => f.write_str("unsubscribe"),
        }
    }
}

pub struct UpstreamManager {
    backend: Arc<dyn UpstreamBackend>,
    retry: Box<dyn RetryPolicy>,
    default_topic: Option<String>,
    call_timeout: Duration,
}

impl UpstreamManager {
    pub fn new(backend: Arc<dyn UpstreamBackend>) -> Self {
        Self {
            backend,
            retry: Box::new(NoRetry),
            default_topic: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: impl RetryPolicy + 'static) -> Self {
        self.retry = Box::new(retry);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets the pinned default topic. An empty name disables it.
    pub fn with_default_topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        self.default_topic = (!topic.is_empty()).then_some(topic);
        self
    }

    pub fn default_topic(&self) -> Option<&str> {
        self.default_topic.as_deref()
    }

    pub fn is_pinned(&self, topic: &str) -> bool {
        self.default_topic.as_deref() == Some(topic)
    }

    /// Subscribes the default topic, independent of any client.
    pub async fn subscribe_default(&self) -> Result<(), UpstreamError> {
        let Some(topic) = self.default_topic.as_deref() else {
            return Ok(());
        };
        self.call(Op::Subscribe, topic).await?;
        info!("Listening for updates on default channel \"{topic}\"");
        Ok(())
    }

    /// The topic just gained its first local subscriber.
    pub async fn on_created(&self, topic: &str) {
        if self.is_pinned(topic) {
            return;
        }
        if self.call(Op::Subscribe, topic).await.is_ok() {
            info!("Subscribed to upstream channel: {topic}");
        }
    }

    /// The topic just lost its last local subscriber.
    pub async fn on_emptied(&self, topic: &str) {
        if self.is_pinned(topic) {
            return;
        }
        if self.call(Op::Unsubscribe, topic).await.is_ok() {
            info!("Unsubscribed from upstream channel: {topic}");
        }
    }

    async fn call(&self, op: Op, topic: &str) -> Result<(), UpstreamError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = match op {
                Op::Subscribe => self.backend.subscribe(topic),
                Op::Unsubscribe => self.backend.unsubscribe(topic),
            };
            let result = tokio::time::timeout(self.call_timeout, request)
                .await
                .unwrap_or_else(|_| Err(UpstreamError::Timeout(self.call_timeout)));
            let err = match result {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            match self.retry.next_delay(attempt) {
                Some(delay) => {
                    warn!("Upstream {op} of {topic} failed (attempt {attempt}): {err}; retrying");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!("Failed to {op} upstream channel {topic}: {err}");
                    return Err(err);
                }
            }
        }
    }
}
