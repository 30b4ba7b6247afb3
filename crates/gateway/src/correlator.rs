//! C5: correlates outbound platform-action requests with their replies by
//! envelope id.
//!
//! Grounded in the teacher's JSON-RPC `PendingRequests` map
//! (`Arc<Mutex<HashMap<RequestId, oneshot::Sender<...>>>>`), adapted for this
//! protocol's LWW rendezvous: a `tokio::sync::oneshot` channel is single-use,
//! so "last writer wins" is implemented by removing the map entry before
//! completing it — whichever side (a timed-out waiter, or an arriving reply)
//! gets there first decides the outcome, and the loser finds nothing to act
//! on instead of racing a stale sender.
//!
//! Generic over the reply payload: [`crate::gateway::Gateway`] instantiates
//! this with [`crate::codec::Envelope`], since a platform-action reply (e.g.
//! `agents`) carries its answer in envelope fields rather than in a wrapped
//! [`crate::message::Message`].

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};

pub struct Correlator<T> {
    pending: Mutex<HashMap<String, oneshot::Sender<T>>>,
}

impl<T> Correlator<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Registers interest in a reply to `request_id`.
    pub async fn register(&self, request_id: String) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, tx);
        rx
    }

    /// Delivers an inbound reply for `request_id`. Returns `true` if a
    /// waiter was still registered and accepted it.
    pub async fn complete(&self, request_id: &str, value: T) -> bool {
        let sender = self.pending.lock().await.remove(request_id);
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Drops a pending registration without delivering anything — used when
    /// a waiter gives up (e.g. on timeout) so a later-arriving reply finds no
    /// entry and is silently dropped rather than delivered to nobody.
    pub async fn cancel(&self, request_id: &str) {
        self.pending.lock().await.remove(request_id);
    }

    pub async fn is_pending(&self, request_id: &str) -> bool {
        self.pending.lock().await.contains_key(request_id)
    }

    /// Drops every outstanding registration, e.g. on gateway close.
    pub async fn cancel_all(&self) {
        self.pending.lock().await.clear();
    }

    /// Awaits a previously-[`register`](Self::register)ed reply.
    ///
    /// `deadline = None` blocks until a reply arrives or the transport
    /// drops the waiter (the `BLOCKING` sentinel); `Some(Duration::ZERO)`
    /// polls once without waiting (`NON_BLOCKING`); any other `Some(d)`
    /// waits up to `d` before cancelling the registration and giving up.
    pub async fn wait(
        &self,
        request_id: &str,
        rx: oneshot::Receiver<T>,
        deadline: Option<Duration>,
    ) -> Option<T> {
        match deadline {
            None => rx.await.ok(),
            Some(d) => match tokio::time::timeout(d, rx).await {
                Ok(Ok(value)) => Some(value),
                Ok(Err(_)) => None,
                Err(_) => {
                    self.cancel(request_id).await;
                    None
                }
            },
        }
    }
}

impl<T> Default for Correlator<T> {
    fn default() -> Self {
        Self::new()
    }
}
