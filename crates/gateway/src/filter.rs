//! The match predicate shared by the correlator's implicit reply filter and
//! the receiver pool's explicit `receive(filter, timeout)` filter.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::message::Message;

/// Selects which inbound message a waiter is interested in.
///
/// `Predicate` closures run under [`std::panic::catch_unwind`] — a panicking
/// predicate is treated as a non-match and logged, never torn down the
/// dispatch loop that is evaluating it on behalf of every waiter.
#[derive(Clone)]
pub enum Filter {
    /// Matches any message.
    Any,
    /// Matches a message whose `inReplyTo` equals the given request id.
    ReplyTo(String),
    /// Matches a message whose class tag equals or short-matches the tag.
    ClassTag(String),
    /// Matches by an arbitrary predicate.
    Predicate(Arc<dyn Fn(&Message) -> bool + Send + Sync>),
}

impl Filter {
    pub fn predicate(f: impl Fn(&Message) -> bool + Send + Sync + 'static) -> Self {
        Filter::Predicate(Arc::new(f))
    }

    pub fn matches(&self, msg: &Message) -> bool {
        match self {
            Filter::Any => true,
            Filter::ReplyTo(id) => msg.in_reply_to.as_deref() == Some(id.as_str()),
            Filter::ClassTag(tag) => msg.is_a(tag),
            Filter::Predicate(f) => match panic::catch_unwind(AssertUnwindSafe(|| f(msg))) {
                Ok(matched) => matched,
                Err(_) => {
                    tracing::warn!("receive filter predicate panicked; treating as non-match");
                    false
                }
            },
        }
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Any => write!(f, "Filter::Any"),
            Filter::ReplyTo(id) => write!(f, "Filter::ReplyTo({id:?})"),
            Filter::ClassTag(tag) => write!(f, "Filter::ClassTag({tag:?})"),
            Filter::Predicate(_) => write!(f, "Filter::Predicate(..)"),
        }
    }
}
