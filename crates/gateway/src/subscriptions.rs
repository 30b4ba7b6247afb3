//! C8: the set of topics this gateway currently wants delivery for.
//!
//! The set itself only tracks membership; [`crate::gateway::Gateway`] is
//! responsible for emitting the `wantsMessagesFor` reconciliation frame
//! whenever [`subscribe`](Subscriptions::subscribe) or
//! [`unsubscribe`](Subscriptions::unsubscribe) actually changes membership.
//! Re-subscribing to an already-subscribed topic (or unsubscribing from one
//! never subscribed) changes nothing and triggers no frame — idempotence.

use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::identifier::Identifier;

pub struct Subscriptions {
    topics: Mutex<HashSet<Identifier>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashSet::new()),
        }
    }

    /// Returns `true` iff this was a new subscription (membership changed).
    pub async fn subscribe(&self, topic: Identifier) -> bool {
        self.topics.lock().await.insert(topic)
    }

    /// Returns `true` iff `topic` was actually subscribed (membership
    /// changed).
    pub async fn unsubscribe(&self, topic: &Identifier) -> bool {
        self.topics.lock().await.remove(topic)
    }

    pub async fn contains(&self, topic: &Identifier) -> bool {
        self.topics.lock().await.contains(topic)
    }

    pub async fn snapshot(&self) -> Vec<Identifier> {
        self.topics.lock().await.iter().cloned().collect()
    }
}

impl Default for Subscriptions {
    fn default() -> Self {
        Self::new()
    }
}
