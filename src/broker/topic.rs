use std::collections::HashSet;

use crate::client::ClientId;

/// A named channel and the downstream clients currently listening on it.
///
/// Owned by the `TopicRegistry`, which drops a `Topic` as soon as its
/// subscriber set becomes empty.
#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub subscribers: HashSet<ClientId>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashSet::new(),
        }
    }

    /// Adds the subscriber's ID. Returns `false` if it was already present.
    pub fn subscribe(&mut self, id: ClientId) -> bool {
        self.subscribers.insert(id)
    }

    /// Removes the subscriber's ID. Returns `false` if it was not present.
    pub fn unsubscribe(&mut self, id: &ClientId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
