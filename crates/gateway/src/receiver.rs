//! C6: the pool of waiters parked on [`crate::Gateway::receive`].
//!
//! Dispatch picks the first-registered waiter whose [`Filter`] matches —
//! spec law "Filter first-match" — so two overlapping `receive()` calls
//! resolve in call order rather than arbitrarily.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};

use crate::filter::Filter;
use crate::message::Message;

pub struct ReceiverPool {
    next_token: AtomicU64,
    waiters: Mutex<Vec<(u64, Filter, oneshot::Sender<Message>)>>,
}

impl ReceiverPool {
    pub fn new() -> Self {
        Self {
            next_token: AtomicU64::new(0),
            waiters: Mutex::new(Vec::new()),
        }
    }

    /// Registers a waiter; the returned token cancels the registration.
    pub async fn register(&self, filter: Filter) -> (u64, oneshot::Receiver<Message>) {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.push((token, filter, tx));
        (token, rx)
    }

    pub async fn cancel(&self, token: u64) {
        self.waiters.lock().await.retain(|(t, _, _)| *t != token);
    }

    /// Offers `msg` to the first matching waiter in registration order.
    /// Returns `true` if some waiter accepted it.
    pub async fn dispatch(&self, msg: &Message) -> bool {
        let mut waiters = self.waiters.lock().await;
        let Some(pos) = waiters.iter().position(|(_, filter, _)| filter.matches(msg)) else {
            return false;
        };
        let (_, _, tx) = waiters.remove(pos);
        tx.send(msg.clone()).is_ok()
    }

    /// Drops every outstanding waiter, e.g. on gateway close.
    pub async fn cancel_all(&self) {
        self.waiters.lock().await.clear();
    }

    pub async fn wait(
        &self,
        token: u64,
        rx: oneshot::Receiver<Message>,
        deadline: Option<Duration>,
    ) -> Option<Message> {
        match deadline {
            None => rx.await.ok(),
            Some(d) => match tokio::time::timeout(d, rx).await {
                Ok(Ok(msg)) => Some(msg),
                Ok(Err(_)) => None,
                Err(_) => {
                    self.cancel(token).await;
                    None
                }
            },
        }
    }
}

impl Default for ReceiverPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_picks_first_registered_match() {
        let pool = ReceiverPool::new();
        let (_t1, rx1) = pool.register(Filter::Any).await;
        let (_t2, rx2) = pool.register(Filter::Any).await;

        let msg = Message::new("org.arl.fjage.Message");
        assert!(pool.dispatch(&msg).await);

        assert_eq!(rx1.await.unwrap().id, msg.id);
        drop(rx2);
    }

    #[tokio::test]
    async fn dispatch_skips_non_matching_waiters() {
        let pool = ReceiverPool::new();
        let (_t1, rx1) = pool.register(Filter::ClassTag("GetFileReq".into())).await;
        let (_t2, rx2) = pool
            .register(Filter::ClassTag("ShellExecReq".into()))
            .await;

        let msg = Message::new("org.arl.fjage.shell.ShellExecReq");
        assert!(pool.dispatch(&msg).await);
        assert_eq!(rx2.await.unwrap().id, msg.id);
        drop(rx1);
    }

    #[tokio::test]
    async fn dispatch_with_no_match_returns_false() {
        let pool = ReceiverPool::new();
        let (_t, _rx) = pool.register(Filter::ClassTag("GetFileReq".into())).await;
        let msg = Message::new("org.arl.fjage.shell.ShellExecReq");
        assert!(!pool.dispatch(&msg).await);
    }

    #[tokio::test]
    async fn timeout_cancels_registration() {
        let pool = ReceiverPool::new();
        let (token, rx) = pool.register(Filter::Any).await;
        let result = pool.wait(token, rx, Some(Duration::from_millis(10))).await;
        assert!(result.is_none());

        let msg = Message::new("org.arl.fjage.Message");
        assert!(!pool.dispatch(&msg).await);
    }

    #[tokio::test]
    async fn cancel_all_drops_every_waiter() {
        let pool = ReceiverPool::new();
        let (_t1, rx1) = pool.register(Filter::Any).await;
        let (_t2, rx2) = pool.register(Filter::Any).await;
        pool.cancel_all().await;
        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
    }
}
