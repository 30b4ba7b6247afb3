//! Wire codec: the line-delimited JSON envelope, polymorphic message
//! inflation, and numeric/complex array (un)packing described in spec §4.1.
//!
//! Complex-valued fields are represented in [`Message::fields`] as the
//! internal sentinel shape `{"__complex__": true, "values": [[re, im], ...]}`
//! on both sides of the wire — this keeps the field bag plain JSON (no
//! dependency on a complex-number crate) while still letting callers build
//! and read complex fields explicitly rather than guessing array shapes.

use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::identifier::Identifier;
use crate::message::Message;
use crate::performative::Performative;

const COMPLEX_SENTINEL_KEY: &str = "__complex__";
const COMPLEX_VALUES_KEY: &str = "values";

/// Top-level operation name in a protocol frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Agents,
    ContainsAgent,
    Services,
    AgentForService,
    AgentsForService,
    Send,
    WantsMessagesFor,
    Shutdown,
}

impl Action {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Action::Agents => "agents",
            Action::ContainsAgent => "containsAgent",
            Action::Services => "services",
            Action::AgentForService => "agentForService",
            Action::AgentsForService => "agentsForService",
            Action::Send => "send",
            Action::WantsMessagesFor => "wantsMessagesFor",
            Action::Shutdown => "shutdown",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "agents" => Action::Agents,
            "containsAgent" => Action::ContainsAgent,
            "services" => Action::Services,
            "agentForService" => Action::AgentForService,
            "agentsForService" => Action::AgentsForService,
            "send" => Action::Send,
            "wantsMessagesFor" => Action::WantsMessagesFor,
            "shutdown" => Action::Shutdown,
            _ => return None,
        })
    }
}

/// The single flat top-level JSON object exchanged as one line of the wire
/// protocol. Unlike a tagged enum, every field is independently optional —
/// this mirrors the wire shape itself, which is a single open object with
/// conditionally-present keys rather than a discriminated union.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    pub id: Option<String>,
    pub action: Option<Action>,
    pub in_response_to: Option<String>,
    pub agent_id: Option<Identifier>,
    pub agent_ids: Option<Vec<Identifier>>,
    pub service: Option<String>,
    pub services: Option<Vec<String>>,
    pub answer: Option<bool>,
    pub message: Option<Message>,
    pub relay: Option<bool>,
    pub alive: Option<bool>,
}

impl Envelope {
    pub fn encode(&self) -> String {
        let mut obj = Map::new();
        if let Some(id) = &self.id {
            obj.insert("id".into(), id.clone().into());
        }
        if let Some(action) = &self.action {
            obj.insert("action".into(), action.as_wire().into());
        }
        if let Some(v) = &self.in_response_to {
            obj.insert("inResponseTo".into(), v.clone().into());
        }
        if let Some(v) = &self.agent_id {
            obj.insert("agentID".into(), v.to_wire().into());
        }
        if let Some(v) = &self.agent_ids {
            obj.insert(
                "agentIDs".into(),
                Value::Array(v.iter().map(|a| Value::from(a.to_wire())).collect()),
            );
        }
        if let Some(v) = &self.service {
            obj.insert("service".into(), v.clone().into());
        }
        if let Some(v) = &self.services {
            obj.insert(
                "services".into(),
                Value::Array(v.iter().map(|s| Value::from(s.clone())).collect()),
            );
        }
        if let Some(v) = self.answer {
            obj.insert("answer".into(), v.into());
        }
        if let Some(msg) = &self.message {
            obj.insert("message".into(), encode_message(msg));
        }
        if let Some(v) = self.relay {
            obj.insert("relay".into(), v.into());
        }
        if let Some(v) = self.alive {
            obj.insert("alive".into(), v.into());
        }
        Value::Object(obj).to_string()
    }

    pub fn decode(line: &str) -> Result<Self, GatewayError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| GatewayError::DecodeFault(format!("invalid JSON: {e}")))?;
        let obj = value
            .as_object()
            .ok_or_else(|| GatewayError::DecodeFault("frame is not a JSON object".into()))?;

        let mut env = Envelope::default();
        env.id = obj.get("id").and_then(Value::as_str).map(str::to_string);
        env.action = obj
            .get("action")
            .and_then(Value::as_str)
            .and_then(Action::from_wire);
        env.in_response_to = obj
            .get("inResponseTo")
            .and_then(Value::as_str)
            .map(str::to_string);
        env.agent_id = obj
            .get("agentID")
            .and_then(Value::as_str)
            .map(Identifier::from_wire);
        env.agent_ids = obj.get("agentIDs").and_then(Value::as_array).map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(Identifier::from_wire)
                .collect()
        });
        env.service = obj
            .get("service")
            .and_then(Value::as_str)
            .map(str::to_string);
        env.services = obj.get("services").and_then(Value::as_array).map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });
        env.answer = obj.get("answer").and_then(Value::as_bool);
        env.message = match obj.get("message") {
            Some(v) => Some(decode_message(v)?),
            None => None,
        };
        env.relay = obj.get("relay").and_then(Value::as_bool);
        env.alive = obj.get("alive").and_then(Value::as_bool);
        Ok(env)
    }
}

/// Encodes a [`Message`] to its `{"clazz": ..., "data": {...}}` envelope.
pub fn encode_message(msg: &Message) -> Value {
    let mut data = Map::new();
    data.insert("msgID".into(), msg.id.clone().into());
    data.insert("perf".into(), msg.performative.as_wire().into());
    if let Some(sender) = &msg.sender {
        data.insert("sender".into(), sender.to_wire().into());
    }
    if let Some(recipient) = &msg.recipient {
        data.insert("recipient".into(), recipient.to_wire().into());
    }
    if let Some(reply) = &msg.in_reply_to {
        data.insert("inReplyTo".into(), reply.clone().into());
    }
    for (key, value) in &msg.fields {
        if let Some(pairs) = as_complex_sentinel(value) {
            let interleaved: Vec<Value> = pairs
                .iter()
                .flat_map(|(re, im)| [Value::from(*re), Value::from(*im)])
                .collect();
            data.insert(key.clone(), Value::Array(interleaved));
            data.insert(format!("{key}__isComplex"), Value::Bool(true));
        } else {
            data.insert(key.clone(), value.clone());
        }
    }
    let mut envelope = Map::new();
    envelope.insert("clazz".into(), msg.class_tag.clone().into());
    envelope.insert("data".into(), Value::Object(data));
    Value::Object(envelope)
}

/// Decodes a `{"clazz": ..., "data": {...}}` value into a [`Message`].
///
/// An unrecognized `clazz` still produces a `Message` — the tag is preserved
/// verbatim so the frame round-trips losslessly even if this process has no
/// typed knowledge of the class.
pub fn decode_message(value: &Value) -> Result<Message, GatewayError> {
    let obj = value
        .as_object()
        .ok_or_else(|| GatewayError::DecodeFault("message is not a JSON object".into()))?;
    let class_tag = obj
        .get("clazz")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::DecodeFault("message missing clazz".into()))?
        .to_string();
    let data = obj
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| GatewayError::DecodeFault("message missing data".into()))?;

    let mut msg = Message::new(class_tag);
    let complex_keys: std::collections::HashSet<&str> = data
        .keys()
        .filter_map(|k| k.strip_suffix("__isComplex"))
        .collect();

    for (key, raw) in data {
        match key.as_str() {
            "msgID" => {
                if let Some(id) = raw.as_str() {
                    msg.id = id.to_string();
                }
            }
            "perf" => {
                if let Some(perf) = raw.as_str().and_then(Performative::from_wire) {
                    msg.performative = perf;
                }
            }
            "sender" => msg.sender = raw.as_str().map(Identifier::from_wire),
            "recipient" => msg.recipient = raw.as_str().map(Identifier::from_wire),
            "inReplyTo" => msg.in_reply_to = raw.as_str().map(str::to_string),
            _ if key.ends_with("__isComplex") => continue,
            _ => {
                let value = if let Some(numbers) = unpack_numeric_array(raw)? {
                    Value::Array(numbers)
                } else if complex_keys.contains(key.as_str()) {
                    materialize_complex(raw)?
                } else {
                    raw.clone()
                };
                msg.fields.insert(key.clone(), value);
            }
        }
    }
    Ok(msg)
}

/// Element codes `B,S,I,J,F,D` map to signed 1/2/4/8/4/8-byte integer or
/// IEEE-754 element sizes respectively, little-endian.
fn unpack_numeric_array(value: &Value) -> Result<Option<Vec<Value>>, GatewayError> {
    let Some(obj) = value.as_object() else {
        return Ok(None);
    };
    let Some(clazz) = obj.get("clazz").and_then(Value::as_str) else {
        return Ok(None);
    };
    if clazz.len() != 2 || !clazz.starts_with('[') {
        return Ok(None);
    }
    let Some(encoded) = obj.get("data").and_then(Value::as_str) else {
        return Ok(None);
    };
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        .map_err(|e| GatewayError::DecodeFault(format!("bad base64 numeric array: {e}")))?;

    let element = clazz.as_bytes()[1];
    let numbers = match element {
        b'B' => bytes.iter().map(|b| Value::from(*b as i8)).collect(),
        b'S' => chunked(&bytes, 2, |c| {
            Value::from(i16::from_le_bytes([c[0], c[1]]))
        })?,
        b'I' => chunked(&bytes, 4, |c| {
            Value::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        })?,
        b'J' => chunked(&bytes, 8, |c| {
            Value::from(i64::from_le_bytes(c.try_into().unwrap()))
        })?,
        b'F' => chunked(&bytes, 4, |c| {
            Value::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
        })?,
        b'D' => chunked(&bytes, 8, |c| {
            Value::from(f64::from_le_bytes(c.try_into().unwrap()))
        })?,
        _ => return Ok(None),
    };
    Ok(Some(numbers))
}

fn chunked(
    bytes: &[u8],
    size: usize,
    f: impl Fn(&[u8]) -> Value,
) -> Result<Vec<Value>, GatewayError> {
    if bytes.len() % size != 0 {
        return Err(GatewayError::DecodeFault(
            "numeric array byte length not a multiple of element size".into(),
        ));
    }
    Ok(bytes.chunks(size).map(f).collect())
}

fn materialize_complex(raw: &Value) -> Result<Value, GatewayError> {
    let interleaved = raw
        .as_array()
        .ok_or_else(|| GatewayError::DecodeFault("complex field is not an array".into()))?;
    if interleaved.len() % 2 != 0 {
        return Err(GatewayError::DecodeFault(
            "complex field has odd element count".into(),
        ));
    }
    let pairs: Vec<Value> = interleaved
        .chunks(2)
        .map(|pair| Value::Array(vec![pair[0].clone(), pair[1].clone()]))
        .collect();
    let mut sentinel = Map::new();
    sentinel.insert(COMPLEX_SENTINEL_KEY.into(), Value::Bool(true));
    sentinel.insert(COMPLEX_VALUES_KEY.into(), Value::Array(pairs));
    Ok(Value::Object(sentinel))
}

fn as_complex_sentinel(value: &Value) -> Option<Vec<(f64, f64)>> {
    let obj = value.as_object()?;
    if obj.get(COMPLEX_SENTINEL_KEY)?.as_bool()? != true {
        return None;
    }
    let pairs = obj.get(COMPLEX_VALUES_KEY)?.as_array()?;
    pairs
        .iter()
        .map(|p| {
            let p = p.as_array()?;
            Some((p.first()?.as_f64()?, p.get(1)?.as_f64()?))
        })
        .collect()
}

/// Builds the `__complex__` sentinel value for a complex-valued field.
pub fn complex_field(pairs: &[(f64, f64)]) -> Value {
    let mut sentinel = Map::new();
    sentinel.insert(COMPLEX_SENTINEL_KEY.into(), Value::Bool(true));
    sentinel.insert(
        COMPLEX_VALUES_KEY.into(),
        Value::Array(
            pairs
                .iter()
                .map(|(re, im)| Value::Array(vec![Value::from(*re), Value::from(*im)]))
                .collect(),
        ),
    );
    Value::Object(sentinel)
}
