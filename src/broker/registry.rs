//! Topic registry
//!
//! The single source of truth for "is anyone listening to this topic". A
//! topic entry exists if and only if its subscriber set is non-empty; every
//! removal prunes synchronously. The outcomes returned by the mutating
//! methods are the transitions the upstream manager reacts to.

use std::collections::{HashMap, HashSet};

use crate::broker::topic::Topic;
use crate::client::ClientId;

/// Outcome of `TopicRegistry::add_subscriber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    /// The topic had no entry; the caller must subscribe upstream.
    Created,
    /// The topic already existed (the client may already have been in it).
    Joined,
}

/// Outcome of `TopicRegistry::remove_subscriber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removed {
    /// The last subscriber left and the entry is gone; the caller must
    /// unsubscribe upstream.
    Emptied,
    /// The client left, others remain.
    Left,
    /// Unknown topic, or the client was not subscribed to it.
    Absent,
}

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: HashMap<String, Topic>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `client` to `topic`, creating the entry on first use. Idempotent.
    pub fn add_subscriber(&mut self, topic: &str, client: &ClientId) -> Added {
        match self.topics.get_mut(topic) {
            Some(entry) => {
                entry.subscribe(client.clone());
                Added::Joined
            }
            None => {
                let mut entry = Topic::new(topic);
                entry.subscribe(client.clone());
                self.topics.insert(topic.to_string(), entry);
                Added::Created
            }
        }
    }

    /// Removes `client` from `topic`, deleting the entry if it becomes empty.
    pub fn remove_subscriber(&mut self, topic: &str, client: &ClientId) -> Removed {
        let Some(entry) = self.topics.get_mut(topic) else {
            return Removed::Absent;
        };
        if !entry.unsubscribe(client) {
            return Removed::Absent;
        }
        if entry.is_empty() {
            self.topics.remove(topic);
            Removed::Emptied
        } else {
            Removed::Left
        }
    }

    /// Removes `client` from every topic and returns the topics that became
    /// empty (and were pruned) as a result.
    pub fn remove_connection_from_all(&mut self, client: &ClientId) -> Vec<String> {
        let mut emptied = Vec::new();
        self.topics.retain(|name, entry| {
            if entry.unsubscribe(client) && entry.is_empty() {
                emptied.push(name.clone());
                false
            } else {
                true
            }
        });
        emptied
    }

    /// Snapshot of the subscribers of `topic`; empty if the topic is unknown.
    pub fn subscribers_of(&self, topic: &str) -> HashSet<ClientId> {
        self.topics
            .get(topic)
            .map(|entry| entry.subscribers.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
