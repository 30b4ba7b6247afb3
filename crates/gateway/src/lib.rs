#![forbid(unsafe_code)]
//! Client-side gateway for an agent platform reachable over a line-delimited
//! JSON protocol on TCP.
//!
//! An external process uses [`Gateway`] to address named agents or pub/sub
//! topics, send one-shot messages or request/reply exchanges correlated by
//! message id, subscribe to topics for asynchronous notifications, query
//! platform metadata, and read/write remote parameters.
//!
//! ```rust,no_run
//! use fjage_gateway::{Gateway, GatewayOptions, Identifier, Message, Timeout};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gw = Gateway::connect("localhost", 1100, GatewayOptions::default()).await?;
//! let shell = Identifier::agent("shell");
//! let msg = Message::new("org.arl.fjage.shell.ShellExecReq")
//!     .with_recipient(shell)
//!     .with_field("command", "ps");
//! let reply = gw.request(msg, Timeout::Default).await?;
//! println!("{reply:?}");
//! # Ok(()) }
//! ```
//!
//! This crate has no knowledge of what runs on the other end of the wire —
//! it implements the client half of the protocol only: the connection
//! lifecycle, the correlator, the receive pipeline, the subscription
//! reconciler, and the codec. Not in scope: an agent container, scheduler,
//! or behavior runtime; message persistence across restarts; delivery while
//! disconnected; exactly-once semantics.

mod codec;
mod correlator;
mod error;
mod filter;
mod gateway;
mod identifier;
mod inbox;
mod message;
mod performative;
mod receiver;
mod registry;
mod subscriptions;
mod transport;
mod uuid7;

pub use crate::codec::{Action, Envelope};
pub use crate::error::GatewayError;
pub use crate::filter::Filter;
pub use crate::gateway::{Gateway, GatewayOptions, Timeout};
pub use crate::identifier::Identifier;
pub use crate::message::{Message, ParameterReq, ParameterRsp, CLASS_PARAMETER_REQ, CLASS_PARAMETER_RSP};
pub use crate::performative::Performative;
pub use crate::registry::Registry;
