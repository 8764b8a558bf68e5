//! Redis pub/sub backend
//!
//! One pubsub connection is split into a sink, used for SUBSCRIBE and
//! UNSUBSCRIBE, and a stream drained by a supervisor task that forwards every
//! published message into the relay's upstream channel.
//!
//! When the stream ends the supervisor reconnects with a doubling backoff and
//! resubscribes every topic currently wanted. The upstream sender lives in
//! the supervisor, so the relay's upstream loop survives a Redis restart.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::{PubSubSink, PubSubStream};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::upstream::backend::{UpstreamBackend, UpstreamMessage};
use crate::utils::error::UpstreamError;

/// Upper bound for the reconnect delay.
pub const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(30);

/// The live sink, if connected, and the topics that should be subscribed.
///
/// `topics` is the source of truth across reconnects: it is updated before
/// the sink is touched, so a topic requested mid-reconnect is still picked up
/// by the resubscribe.
#[derive(Default)]
pub(crate) struct Subscriptions {
    sink: Mutex<Option<PubSubSink>>,
    topics: StdMutex<HashSet<String>>,
}

impl Subscriptions {
    fn topics(&self) -> MutexGuard<'_, HashSet<String>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Topics to restore on the next connection, sorted.
    pub(crate) fn wanted(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics().iter().cloned().collect();
        topics.sort();
        topics
    }

    #[cfg(test)]
    pub(crate) async fn is_connected(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    pub(crate) async fn subscribe(&self, topic: &str) -> Result<(), UpstreamError> {
        self.topics().insert(topic.to_string());
        match self.sink.lock().await.as_mut() {
            Some(sink) => Ok(sink.subscribe(topic).await?),
            None => Err(UpstreamError::Unavailable(format!(
                "redis reconnecting, {topic} will be subscribed once connected"
            ))),
        }
    }

    pub(crate) async fn unsubscribe(&self, topic: &str) -> Result<(), UpstreamError> {
        self.topics().remove(topic);
        match self.sink.lock().await.as_mut() {
            Some(sink) => Ok(sink.unsubscribe(topic).await?),
            // Nothing to undo: the topic is no longer in the resubscribe set.
            None => Ok(()),
        }
    }

    async fn disconnected(&self) {
        *self.sink.lock().await = None;
    }

    /// Subscribes every wanted topic on a fresh sink, then installs it.
    async fn restore(&self, mut sink: PubSubSink) -> Result<usize, UpstreamError> {
        let mut slot = self.sink.lock().await;
        let topics = self.wanted();
        for topic in &topics {
            sink.subscribe(topic).await?;
        }
        *slot = Some(sink);
        Ok(topics.len())
    }
}

pub struct RedisBackend {
    subscriptions: Arc<Subscriptions>,
    supervisor: JoinHandle<()>,
}

impl RedisBackend {
    pub async fn connect(
        url: &str,
        messages: UnboundedSender<UpstreamMessage>,
        reconnect_backoff: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = redis::Client::open(url)?;
        let (sink, stream) = client.get_async_pubsub().await?.split();

        let subscriptions = Arc::new(Subscriptions {
            sink: Mutex::new(Some(sink)),
            topics: StdMutex::default(),
        });
        let supervisor = tokio::spawn(supervise(
            client,
            subscriptions.clone(),
            stream,
            messages,
            reconnect_backoff,
        ));

        Ok(Self {
            subscriptions,
            supervisor,
        })
    }
}

impl Drop for RedisBackend {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

#[async_trait]
impl UpstreamBackend for RedisBackend {
    async fn subscribe(&self, topic: &str) -> Result<(), UpstreamError> {
        self.subscriptions.subscribe(topic).await
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), UpstreamError> {
        self.subscriptions.unsubscribe(topic).await
    }
}

async fn supervise(
    client: redis::Client,
    subscriptions: Arc<Subscriptions>,
    mut stream: PubSubStream,
    messages: UnboundedSender<UpstreamMessage>,
    reconnect_backoff: Duration,
) {
    loop {
        if !forward(&mut stream, &messages).await {
            debug!("Upstream receiver dropped; stopping Redis listener");
            return;
        }
        warn!("Redis pubsub stream closed; reconnecting");
        subscriptions.disconnected().await;
        stream = reconnect(&client, &subscriptions, reconnect_backoff).await;
    }
}

/// Forwards published messages until the stream ends. Returns false once
/// nobody is listening any more.
async fn forward(stream: &mut PubSubStream, messages: &UnboundedSender<UpstreamMessage>) -> bool {
    while let Some(msg) = stream.next().await {
        let topic = msg.get_channel_name().to_string();
        debug!("Message received from Redis on {topic}");
        let forwarded = UpstreamMessage::new(topic, msg.get_payload_bytes().to_vec());
        if messages.send(forwarded).is_err() {
            return false;
        }
    }
    !messages.is_closed()
}

async fn reconnect(
    client: &redis::Client,
    subscriptions: &Subscriptions,
    initial: Duration,
) -> PubSubStream {
    let mut delay = initial;
    loop {
        tokio::time::sleep(delay).await;
        match reopen(client, subscriptions).await {
            Ok((stream, restored)) => {
                info!("Reconnected to Redis; resubscribed {restored} channel(s)");
                return stream;
            }
            Err(e) => {
                delay = next_backoff(delay);
                warn!("Redis reconnect failed: {e}; retrying in {delay:?}");
            }
        }
    }
}

async fn reopen(
    client: &redis::Client,
    subscriptions: &Subscriptions,
) -> Result<(PubSubStream, usize), UpstreamError> {
    let (sink, stream) = client.get_async_pubsub().await?.split();
    let restored = subscriptions.restore(sink).await?;
    Ok((stream, restored))
}

pub(crate) fn next_backoff(delay: Duration) -> Duration {
    delay.saturating_mul(2).min(MAX_RECONNECT_BACKOFF)
}
