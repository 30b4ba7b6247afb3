use std::fmt;

use serde_json::Value;

use crate::gateway::GatewayHandle;
use crate::message::ParameterReq;

/// Names an agent or a pub/sub topic on the platform.
///
/// Two identifiers are equal iff their `name` and `is_topic` agree; the `#`
/// wire prefix is syntactic only and carries no weight in equality.
#[derive(Clone)]
pub struct Identifier {
    name: String,
    is_topic: bool,
    index_hint: i32,
    owner: Option<GatewayHandle>,
}

impl Identifier {
    /// Creates an unowned agent identifier.
    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_topic: false,
            index_hint: -1,
            owner: None,
        }
    }

    /// Creates an unowned topic identifier.
    pub fn topic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_topic: true,
            index_hint: -1,
            owner: None,
        }
    }

    pub(crate) fn with_owner(mut self, owner: GatewayHandle) -> Self {
        self.owner = Some(owner);
        self
    }

    /// A copy of this identifier with no owning gateway, e.g. before
    /// embedding it as a message recipient that must not keep a gateway
    /// alive via a stray back-reference.
    pub(crate) fn without_owner(&self) -> Self {
        Self {
            name: self.name.clone(),
            is_topic: self.is_topic,
            index_hint: self.index_hint,
            owner: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_topic(&self) -> bool {
        self.is_topic
    }

    pub fn index_hint(&self) -> i32 {
        self.index_hint
    }

    /// Returns an indexed view of this identifier (for indexed parameters),
    /// sharing the same owner.
    pub fn indexed(&self, index: i32) -> Self {
        Self {
            name: self.name.clone(),
            is_topic: self.is_topic,
            index_hint: index,
            owner: self.owner.clone(),
        }
    }

    /// Promotes a plain agent identifier to its notification topic, e.g.
    /// `shell` -> `shell__ntf`, or `shell__status__ntf` when `qualifier` is
    /// `Some("status")`.
    pub fn notification_topic(&self, qualifier: Option<&str>) -> Self {
        if self.is_topic {
            return self.clone();
        }
        let name = match qualifier {
            Some(q) => format!("{}__{}__ntf", self.name, q),
            None => format!("{}__ntf", self.name),
        };
        Self {
            name,
            is_topic: true,
            index_hint: -1,
            owner: self.owner.clone(),
        }
    }

    /// Wire form: `name` for agents, `#name` for topics.
    pub fn to_wire(&self) -> String {
        if self.is_topic {
            format!("#{}", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Inflates an identifier from its wire form.
    pub fn from_wire(wire: &str) -> Self {
        if let Some(name) = wire.strip_prefix('#') {
            Self::topic(name)
        } else {
            Self::agent(wire)
        }
    }

    /// Reads a single parameter from the agent represented by this
    /// identifier, via a `ParameterReq`/`ParameterRsp` round trip.
    pub async fn get(&self, param: &str) -> Option<Value> {
        let gw = self.owner.as_ref()?;
        let req = ParameterReq::new(self.index_hint).with_get(param);
        let rsp = gw.request_parameter(self, req).await?;
        rsp.get(param)
    }

    /// Reads every parameter the agent exposes.
    pub async fn get_all(&self) -> std::collections::HashMap<String, Value> {
        let Some(gw) = self.owner.as_ref() else {
            return std::collections::HashMap::new();
        };
        let req = ParameterReq::new(self.index_hint);
        match gw.request_parameter(self, req).await {
            Some(rsp) => rsp.all(),
            None => std::collections::HashMap::new(),
        }
    }

    /// Writes a parameter and returns the post-write value, which may differ
    /// from the requested value if the peer coerced it.
    pub async fn set(&self, param: &str, value: Value) -> Option<Value> {
        let gw = self.owner.as_ref()?;
        let req = ParameterReq::new(self.index_hint).with_set(param, value);
        let rsp = gw.request_parameter(self, req).await?;
        rsp.get(param)
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.is_topic == other.is_topic
    }
}
impl Eq for Identifier {}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.is_topic.hash(state);
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identifier")
            .field("name", &self.name)
            .field("is_topic", &self.is_topic)
            .field("index_hint", &self.index_hint)
            .finish()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}
