//! C9: the public façade. Composes C1–C8, owns the connection's dispatch
//! loop, and is the only thing application code touches directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::{Action, Envelope};
use crate::correlator::Correlator;
use crate::error::GatewayError;
use crate::filter::Filter;
use crate::identifier::Identifier;
use crate::inbox::{Inbox, DEFAULT_CAPACITY};
use crate::message::{Message, ParameterReq, ParameterRsp};
use crate::receiver::ReceiverPool;
use crate::registry::Registry;
use crate::subscriptions::Subscriptions;
use crate::transport::{Transport, DEFAULT_RECONNECT_DELAY};
use crate::uuid7;

/// Tuning knobs for [`Gateway::connect`].
#[derive(Clone, Debug)]
pub struct GatewayOptions {
    /// `None` disables reconnection; `Some(d)` retries every `d`.
    pub reconnect_delay: Option<Duration>,
    /// Applied to `receive`/`request`/query calls that don't specify their
    /// own timeout. `None` blocks indefinitely.
    pub default_timeout: Option<Duration>,
    pub inbox_capacity: usize,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Some(DEFAULT_RECONNECT_DELAY),
            default_timeout: Some(Duration::from_secs(5)),
            inbox_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Per-call wait policy for `receive`/`request`/the metadata queries, per
/// spec §5's `-1` = "wait forever" sentinel. `Option<Duration>` alone can't
/// distinguish "use the gateway's configured default" from "ignore the
/// default and block forever", so this spells both out explicitly.
#[derive(Clone, Copy, Debug)]
pub enum Timeout {
    /// Falls back to [`GatewayOptions::default_timeout`].
    Default,
    /// Blocks until a reply arrives, regardless of the gateway's default.
    Forever,
    /// Waits at most `Duration`; `Duration::ZERO` polls without blocking.
    After(Duration),
}

impl Timeout {
    fn resolve(self, default_timeout: Option<Duration>) -> Option<Duration> {
        match self {
            Timeout::Default => default_timeout,
            Timeout::Forever => None,
            Timeout::After(d) => Some(d),
        }
    }
}

struct Inner {
    self_id: Identifier,
    transport: Transport,
    correlator: Correlator<Envelope>,
    receivers: ReceiverPool,
    inbox: Inbox,
    subs: Subscriptions,
    registry: Registry,
    default_timeout: Option<Duration>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

/// A connected gateway session. Cheap to clone (an `Arc` underneath) — every
/// [`Identifier`] returned by this gateway carries a clone as its owner so
/// `identifier.get("param")` etc. can reach back in.
#[derive(Clone)]
pub struct Gateway(Arc<Inner>);

/// Alias used where a type in another module just needs "the thing an
/// [`Identifier`] can call back into" without depending on the full façade
/// API surface.
pub(crate) type GatewayHandle = Gateway;

impl Gateway {
    /// Opens the transport, starts the dispatch loop, and announces this
    /// gateway's own identifier to the peer.
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
        opts: GatewayOptions,
    ) -> Result<Self, GatewayError> {
        if port == 0 {
            return Err(GatewayError::InvalidArgument("port must be nonzero".into()));
        }
        let transport = Transport::connect(host, port, opts.reconnect_delay).await?;

        let inner = Arc::new(Inner {
            self_id: Identifier::agent(format!("gateway-{}", uuid7::generate())),
            transport,
            correlator: Correlator::new(),
            receivers: ReceiverPool::new(),
            inbox: Inbox::new(opts.inbox_capacity),
            subs: Subscriptions::new(),
            registry: Registry::default(),
            default_timeout: opts.default_timeout,
            dispatch_task: Mutex::new(None),
        });
        let gateway = Gateway(inner);

        let dispatch_gateway = gateway.clone();
        let task = tokio::spawn(async move { dispatch_gateway.dispatch_loop().await });
        *gateway.0.dispatch_task.lock().await = Some(task);

        gateway.reconcile_subscriptions().await?;
        Ok(gateway)
    }

    /// This gateway's own identifier, usable as a message sender/recipient
    /// and carrying this gateway as its owner for fluent parameter access.
    pub fn id(&self) -> Identifier {
        self.0.self_id.without_owner().with_owner(self.clone())
    }

    pub fn is_alive(&self) -> bool {
        self.0.transport.is_alive()
    }

    /// An agent identifier owned by this gateway, for fluent
    /// `identifier.get("param")`/`.set("param", value)` calls.
    pub fn agent(&self, name: impl Into<String>) -> Identifier {
        Identifier::agent(name).with_owner(self.clone())
    }

    /// A topic identifier owned by this gateway.
    pub fn topic(&self, name: impl Into<String>) -> Identifier {
        Identifier::topic(name).with_owner(self.clone())
    }

    /// The message-class registry, for application code to register its own
    /// concrete message classes at startup (see spec §4.2 / §9).
    pub fn registry(&self) -> &Registry {
        &self.0.registry
    }

    /// Idempotent: tears down the transport, cancels every pending
    /// correlator/receiver-pool waiter (they resolve to `None`), and stops
    /// the dispatch loop.
    pub async fn close(&self) {
        info!(id = %self.0.self_id, "closing gateway");
        self.0.transport.close().await;
        self.0.correlator.cancel_all().await;
        self.0.receivers.cancel_all().await;
        if let Some(task) = self.0.dispatch_task.lock().await.take() {
            task.abort();
        }
    }

    /// Stamps `sender`, encodes `action:"send", relay:true`, and writes the
    /// frame. Fails with [`GatewayError::InvalidArgument`] if `msg` has no
    /// recipient, per spec's "recipient non-empty at send time" invariant.
    pub async fn send(&self, mut msg: Message) -> Result<(), GatewayError> {
        if msg.recipient.is_none() {
            return Err(GatewayError::InvalidArgument(
                "message has no recipient".into(),
            ));
        }
        self.stamp_sender(&mut msg);
        self.write_envelope(&Envelope {
            action: Some(Action::Send),
            relay: Some(true),
            message: Some(msg),
            ..Default::default()
        })
    }

    /// `send(msg)` followed by a wait for a reply whose `inReplyTo == msg.id`.
    pub async fn request(
        &self,
        mut msg: Message,
        timeout: Timeout,
    ) -> Result<Option<Message>, GatewayError> {
        if msg.recipient.is_none() {
            return Err(GatewayError::InvalidArgument(
                "message has no recipient".into(),
            ));
        }
        self.stamp_sender(&mut msg);
        let filter = Filter::ReplyTo(msg.id.clone());
        let (token, rx) = self.0.receivers.register(filter).await;

        if let Err(err) = self.write_envelope(&Envelope {
            action: Some(Action::Send),
            relay: Some(true),
            message: Some(msg),
            ..Default::default()
        }) {
            self.0.receivers.cancel(token).await;
            return Err(err);
        }

        let deadline = timeout.resolve(self.0.default_timeout);
        Ok(self.0.receivers.wait(token, rx, deadline).await)
    }

    /// Per spec §4.4: first scans the inbox, then (unless `timeout == 0`)
    /// parks a waiter in the receiver pool.
    pub async fn receive(&self, filter: Filter, timeout: Timeout) -> Option<Message> {
        if let Some(msg) = self.0.inbox.pop_matching(&filter).await {
            return Some(msg);
        }
        let deadline = timeout.resolve(self.0.default_timeout);
        if deadline == Some(Duration::ZERO) {
            return None;
        }
        let (token, rx) = self.0.receivers.register(filter).await;
        self.0.receivers.wait(token, rx, deadline).await
    }

    /// Mutates the subscription set, promoting a plain agent identifier to
    /// its notification topic first. Returns `true` iff membership changed
    /// (and a reconciliation frame was sent).
    pub async fn subscribe(&self, topic: Identifier) -> Result<bool, GatewayError> {
        let topic = self.promote(topic);
        let changed = self.0.subs.subscribe(topic).await;
        if changed {
            self.reconcile_subscriptions().await?;
        }
        Ok(changed)
    }

    pub async fn unsubscribe(&self, topic: Identifier) -> Result<bool, GatewayError> {
        let topic = self.promote(topic);
        let changed = self.0.subs.unsubscribe(&topic).await;
        if changed {
            self.reconcile_subscriptions().await?;
        }
        Ok(changed)
    }

    fn promote(&self, topic: Identifier) -> Identifier {
        if topic.is_topic() {
            topic
        } else {
            topic.notification_topic(None)
        }
    }

    pub async fn agents(&self, timeout: Timeout) -> Result<Vec<Identifier>, GatewayError> {
        let reply = self.query_action(Action::Agents, timeout, |_| {}).await?;
        Ok(reply.and_then(|env| env.agent_ids).unwrap_or_default())
    }

    pub async fn contains_agent(
        &self,
        id: &Identifier,
        timeout: Timeout,
    ) -> Result<bool, GatewayError> {
        let target = id.without_owner();
        let reply = self
            .query_action(Action::ContainsAgent, timeout, |env| {
                env.agent_id = Some(target.clone());
            })
            .await?;
        Ok(reply.and_then(|env| env.answer).unwrap_or(false))
    }

    pub async fn agent_for_service(
        &self,
        service: &str,
        timeout: Timeout,
    ) -> Result<Option<Identifier>, GatewayError> {
        let service = service.to_string();
        let reply = self
            .query_action(Action::AgentForService, timeout, move |env| {
                env.service = Some(service);
            })
            .await?;
        Ok(reply.and_then(|env| env.agent_id))
    }

    pub async fn agents_for_service(
        &self,
        service: &str,
        timeout: Timeout,
    ) -> Result<Vec<Identifier>, GatewayError> {
        let service = service.to_string();
        let reply = self
            .query_action(Action::AgentsForService, timeout, move |env| {
                env.service = Some(service);
            })
            .await?;
        Ok(reply.and_then(|env| env.agent_ids).unwrap_or_default())
    }

    fn stamp_sender(&self, msg: &mut Message) {
        msg.sender = Some(self.0.self_id.without_owner());
    }

    fn write_envelope(&self, env: &Envelope) -> Result<(), GatewayError> {
        self.0.transport.send_line(env.encode())
    }

    async fn reconcile_subscriptions(&self) -> Result<(), GatewayError> {
        let mut agent_ids = vec![self.0.self_id.without_owner()];
        agent_ids.extend(self.0.subs.snapshot().await);
        self.write_envelope(&Envelope {
            action: Some(Action::WantsMessagesFor),
            agent_ids: Some(agent_ids),
            ..Default::default()
        })
    }

    async fn query_action(
        &self,
        action: Action,
        timeout: Timeout,
        build: impl FnOnce(&mut Envelope),
    ) -> Result<Option<Envelope>, GatewayError> {
        let id = uuid7::generate();
        let mut env = Envelope {
            id: Some(id.clone()),
            action: Some(action),
            ..Default::default()
        };
        build(&mut env);

        let rx = self.0.correlator.register(id.clone()).await;
        if let Err(err) = self.write_envelope(&env) {
            self.0.correlator.cancel(&id).await;
            return Err(err);
        }
        let deadline = timeout.resolve(self.0.default_timeout);
        Ok(self.0.correlator.wait(&id, rx, deadline).await)
    }

    /// Reads a parameter on `target`, via a `ParameterReq`/`ParameterRsp`
    /// round trip. Called by [`Identifier::get`]/[`Identifier::set`].
    pub(crate) async fn request_parameter(
        &self,
        target: &Identifier,
        req: ParameterReq,
    ) -> Option<ParameterRsp> {
        let msg = req.into_message().with_recipient(target.without_owner());
        let reply = self.request(msg, Timeout::Default).await.ok().flatten()?;
        Some(ParameterRsp::from_message(&reply))
    }

    async fn dispatch_loop(self) {
        loop {
            let Some(line) = self.0.transport.recv_line().await else {
                break;
            };
            if let Err(err) = self.dispatch_line(&line).await {
                warn!(%err, "dropping malformed frame");
            }
        }
    }

    async fn dispatch_line(&self, line: &str) -> Result<(), GatewayError> {
        let env = Envelope::decode(line)?;

        if env.alive.is_some() {
            debug!("ignoring liveness frame");
            return Ok(());
        }

        if let Some(msg) = env.message.clone() {
            self.dispatch_message(msg).await;
            return Ok(());
        }

        if let Some(id) = env.id.clone() {
            if self.0.correlator.is_pending(&id).await {
                self.0.correlator.complete(&id, env).await;
                return Ok(());
            }
        }

        if let Some(action) = env.action {
            self.handle_peer_action(action, env).await;
        }
        Ok(())
    }

    /// Dispatch rule for inbound agent-to-agent messages (spec §4.4, first
    /// numbered rule): receiver pool first, then inbox; discarded if
    /// addressed to neither this gateway nor a subscribed topic.
    async fn dispatch_message(&self, msg: Message) {
        let addressed = match &msg.recipient {
            Some(r) if *r == self.0.self_id => true,
            Some(r) if r.is_topic() => self.0.subs.contains(r).await,
            _ => false,
        };
        if !addressed {
            debug!(recipient = ?msg.recipient, "discarding message for unaddressed recipient");
            return;
        }
        if self.0.receivers.dispatch(&msg).await {
            return;
        }
        self.0.inbox.push(msg).await;
    }

    /// Synthesizes answers to platform-originated action frames, per spec
    /// §4.4's second dispatch rule.
    async fn handle_peer_action(&self, action: Action, env: Envelope) {
        match action {
            Action::Agents => {
                let own = self.0.self_id.without_owner();
                self.reply_to_action(&env, action, |r| r.agent_ids = Some(vec![own]))
                    .await;
            }
            Action::ContainsAgent => {
                let matched = env
                    .agent_id
                    .as_ref()
                    .map(|id| *id == self.0.self_id)
                    .unwrap_or(false);
                self.reply_to_action(&env, action, |r| r.answer = Some(matched))
                    .await;
            }
            Action::Services => {
                self.reply_to_action(&env, action, |r| r.services = Some(Vec::new()))
                    .await;
            }
            Action::AgentForService => {
                self.reply_to_action(&env, action, |_| {}).await;
            }
            Action::AgentsForService => {
                self.reply_to_action(&env, action, |r| r.agent_ids = Some(Vec::new()))
                    .await;
            }
            Action::Shutdown => self.close().await,
            Action::Send | Action::WantsMessagesFor => {
                debug!(?action, "ignoring action not meaningful from a peer");
            }
        }
    }

    async fn reply_to_action(
        &self,
        request: &Envelope,
        action: Action,
        build: impl FnOnce(&mut Envelope),
    ) {
        let mut response = Envelope {
            id: request.id.clone(),
            in_response_to: Some(action.as_wire().to_string()),
            ..Default::default()
        };
        build(&mut response);
        if let Err(err) = self.write_envelope(&response) {
            warn!(%err, "failed to send synthesized reply");
        }
    }
}
