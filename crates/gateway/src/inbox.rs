//! C7: the bounded FIFO of messages that matched no registered receiver or
//! correlator waiter at dispatch time, and so sit until `receive()`/`request()`
//! picks them up.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::filter::Filter;
use crate::message::Message;

/// Default inbox capacity, beyond which the oldest queued message is
/// discarded to make room for the newest.
pub const DEFAULT_CAPACITY: usize = 512;

pub struct Inbox {
    capacity: usize,
    queue: Mutex<VecDeque<Message>>,
}

impl Inbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends to the tail, dropping the oldest entry if at capacity.
    pub async fn push(&self, msg: Message) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(msg);
    }

    pub async fn pop_front(&self) -> Option<Message> {
        self.queue.lock().await.pop_front()
    }

    /// Removes and returns the oldest entry matching `filter`, preserving
    /// FIFO order among the remaining entries.
    pub async fn pop_matching(&self, filter: &Filter) -> Option<Message> {
        let mut queue = self.queue.lock().await;
        let pos = queue.iter().position(|msg| filter.matches(msg))?;
        queue.remove(pos)
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
