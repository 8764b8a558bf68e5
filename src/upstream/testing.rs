use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::upstream::backend::UpstreamBackend;
use crate::utils::error::UpstreamError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Subscribe(String),
    Unsubscribe(String),
}

/// Backend double that records every attempted call.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    transient_failures: AtomicU32,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn subscribes(&self, topic: &str) -> usize {
        self.count(&Call::Subscribe(topic.to_string()))
    }

    pub fn unsubscribes(&self, topic: &str) -> usize {
        self.count(&Call::Unsubscribe(topic.to_string()))
    }

    fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    /// Every call for `topic` fails from now on.
    pub fn fail_on(&self, topic: &str) {
        self.failing.lock().unwrap().insert(topic.to_string());
    }

    /// Every call for `topic` is recorded and then never completes.
    pub fn hang_on(&self, topic: &str) {
        self.hanging.lock().unwrap().insert(topic.to_string());
    }

    /// The next `n` calls fail, whatever their topic.
    pub fn fail_next(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    async fn record(&self, call: Call, topic: &str) -> Result<(), UpstreamError> {
        // Widens the window for interleavings in concurrency tests.
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push(call);
        let hangs = self.hanging.lock().unwrap().contains(topic);
        if hangs {
            std::future::pending::<()>().await;
        }
        let transient = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient || self.failing.lock().unwrap().contains(topic) {
            return Err(UpstreamError::Unavailable(format!("refused {topic}")));
        }
        Ok(())
    }
}

#[async_trait]
impl UpstreamBackend for RecordingBackend {
    async fn subscribe(&self, topic: &str) -> Result<(), UpstreamError> {
        self.record(Call::Subscribe(topic.to_string()), topic).await
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), UpstreamError> {
        self.record(Call::Unsubscribe(topic.to_string()), topic).await
    }
}
