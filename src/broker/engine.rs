//! Relay engine
//!
//! Routes downstream requests and upstream messages, and tears down
//! connections. Responsibilities:
//! - decode client requests and answer them on the originating connection
//! - keep the topic registry and the upstream subscriptions in step
//! - fan messages out to subscribers without letting one slow or dead client
//!   affect the others
//!
//! Concurrency notes:
//! - The registry lock is held across the upstream call a mutation triggers,
//!   so "check, mutate, call upstream" is atomic. Two concurrent first
//!   subscribers can not both see `Added::Created`.
//! - The client table uses a std mutex that is never held across `.await`.
//!   Client sends go into unbounded channels and never block.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::message::{Envelope, Reply, Request};
use crate::broker::registry::{Added, Removed, TopicRegistry};
use crate::client::{Client, ClientId};
use crate::upstream::{UpstreamManager, UpstreamMessage};
use crate::utils::error::UpstreamError;

pub struct Relay {
    registry: AsyncMutex<TopicRegistry>,
    clients: Mutex<HashMap<ClientId, Client>>,
    upstream: UpstreamManager,
}

impl Relay {
    pub fn new(upstream: UpstreamManager) -> Self {
        Self {
            registry: AsyncMutex::new(TopicRegistry::new()),
            clients: Mutex::new(HashMap::new()),
            upstream,
        }
    }

    /// Subscribes the pinned default topic upstream.
    pub async fn start(&self) -> Result<(), UpstreamError> {
        self.upstream.subscribe_default().await
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<ClientId, Client>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client_count(&self) -> usize {
        self.clients().len()
    }

    pub async fn subscribers_of(&self, topic: &str) -> HashSet<ClientId> {
        self.registry.lock().await.subscribers_of(topic)
    }

    /// Registered topics, sorted.
    pub async fn topics(&self) -> Vec<String> {
        let registry = self.registry.lock().await;
        let mut topics: Vec<String> = registry.topics().map(str::to_string).collect();
        topics.sort();
        topics
    }

    /// Registers a new connection and greets it. No topic is subscribed implicitly.
    pub fn connect(&self, client: Client) {
        self.try_connect(client, usize::MAX);
    }

    /// Like [`Relay::connect`], but refuses the connection when `limit`
    /// clients are already registered. The count is checked under the same
    /// lock as the insert. A refused client is not greeted.
    pub fn try_connect(&self, client: Client, limit: usize) -> bool {
        let id = client.id.clone();
        let total = {
            let mut clients = self.clients();
            if clients.len() >= limit {
                drop(clients);
                warn!("Refusing {id}: connection limit of {limit} reached");
                return false;
            }
            client.send_text(Reply::Welcome.to_string());
            clients.insert(id.clone(), client);
            clients.len()
        };
        info!("{id} connected. Total clients: {total}");
        true
    }

    /// Removes a connection from every topic it was on, unsubscribing upstream
    /// from each topic it leaves empty. Safe to call more than once.
    pub async fn disconnect(&self, id: &ClientId) {
        let mut registry = self.registry.lock().await;
        let known = self.clients().remove(id).is_some();
        let emptied = registry.remove_connection_from_all(id);
        for topic in &emptied {
            self.upstream.on_emptied(topic).await;
        }
        drop(registry);

        if known {
            info!("{id} disconnected. Total clients: {}", self.client_count());
        }
    }

    /// Handles one raw frame from a downstream connection.
    pub async fn handle_request(&self, id: &ClientId, bytes: &[u8]) {
        match Request::decode(bytes) {
            Ok(Request::Message { channel, datum }) => {
                self.relay_message(id, channel, datum).await;
            }
            Ok(Request::Subscribe { channel }) => {
                self.subscribe(id, &channel).await;
                self.reply(id, Reply::Subscribed(channel));
            }
            Ok(Request::Unsubscribe { channel }) => {
                self.unsubscribe(id, &channel).await;
                self.reply(id, Reply::Unsubscribed(channel));
            }
            Err(err) => {
                warn!("Rejected request from {id}: {err}");
                self.reply(id, err.reply());
            }
        }
    }

    pub async fn subscribe(&self, id: &ClientId, topic: &str) {
        let mut registry = self.registry.lock().await;
        // A connection already torn down must not be re-registered.
        if !self.clients().contains_key(id) {
            debug!("Ignoring subscribe to {topic} from unknown client {id}");
            return;
        }
        if registry.add_subscriber(topic, id) == Added::Created {
            self.upstream.on_created(topic).await;
        }
        debug!("{id} subscribed to {topic}");
    }

    pub async fn unsubscribe(&self, id: &ClientId, topic: &str) {
        let mut registry = self.registry.lock().await;
        if registry.remove_subscriber(topic, id) == Removed::Emptied {
            self.upstream.on_emptied(topic).await;
        }
        debug!("{id} unsubscribed from {topic}");
    }

    /// Local relay between clients on the same channel; never goes upstream.
    async fn relay_message(&self, id: &ClientId, channel: String, datum: String) {
        let envelope = Envelope::message(channel, datum);
        let text = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize message: {e}");
                self.reply(id, Reply::ProcessingError);
                return;
            }
        };
        let subscribers = self.subscribers_of(&envelope.channel).await;
        let delivered = self.fan_out(&subscribers, WsMessage::text(text));
        debug!("{id} relayed to {delivered} client(s) on {}", envelope.channel);
    }

    /// Forwards a message from the upstream backend to its subscribers. The
    /// default topic goes to every connected client instead.
    pub async fn route_upstream(&self, msg: UpstreamMessage) {
        let frame = msg.frame();
        let delivered = if self.upstream.is_pinned(&msg.topic) {
            self.broadcast(frame)
        } else {
            let subscribers = self.subscribers_of(&msg.topic).await;
            self.fan_out(&subscribers, frame)
        };
        debug!("Upstream message on {} delivered to {delivered} client(s)", msg.topic);
    }

    /// Drains the upstream channel until every backend sender is gone.
    pub async fn run_upstream(&self, mut messages: UnboundedReceiver<UpstreamMessage>) {
        while let Some(msg) = messages.recv().await {
            self.route_upstream(msg).await;
        }
        warn!("Upstream message channel closed");
    }

    /// Sends `msg` to each listed client. A closed or unknown client is
    /// skipped; returns how many sends succeeded.
    fn fan_out(&self, ids: &HashSet<ClientId>, msg: WsMessage) -> usize {
        let clients = self.clients();
        let mut delivered = 0;
        for id in ids {
            match clients.get(id) {
                Some(client) if client.send(msg.clone()) => delivered += 1,
                Some(_) => debug!("Dropped frame for closed client {id}"),
                None => debug!("No client registered with id: {id}"),
            }
        }
        delivered
    }

    fn broadcast(&self, msg: WsMessage) -> usize {
        let clients = self.clients();
        clients.values().filter(|c| c.send(msg.clone())).count()
    }

    fn reply(&self, id: &ClientId, reply: Reply) {
        if let Some(client) = self.clients().get(id) {
            client.send_text(reply.to_string());
        }
    }
}
