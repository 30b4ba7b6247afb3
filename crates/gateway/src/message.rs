use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::identifier::Identifier;
use crate::performative::Performative;
use crate::uuid7;

/// In-memory representation of a wire message: a fully-qualified class tag,
/// correlation fields, and an open bag of domain-specific fields.
///
/// `fields` holds everything the concrete message class contributes beyond
/// the fixed envelope fields — a typed map rather than dynamic attribute
/// access, per the design notes on systems-language dynamic-attribute access.
#[derive(Clone, Debug)]
pub struct Message {
    pub class_tag: String,
    pub id: String,
    pub performative: Performative,
    pub sender: Option<Identifier>,
    pub recipient: Option<Identifier>,
    pub in_reply_to: Option<String>,
    pub fields: Map<String, Value>,
}

impl Message {
    /// Creates a fresh message of the given class tag, with a new id and the
    /// performative the tag's `Req` suffix implies.
    pub fn new(class_tag: impl Into<String>) -> Self {
        let class_tag = class_tag.into();
        let performative = Performative::default_for_class_tag(&class_tag);
        Self {
            class_tag,
            id: uuid7::generate(),
            performative,
            sender: None,
            recipient: None,
            in_reply_to: None,
            fields: Map::new(),
        }
    }

    /// Builds a reply to `request`: recipient is the request's sender,
    /// `in_reply_to` is the request's id.
    pub fn reply_to(class_tag: impl Into<String>, request: &Message) -> Self {
        let mut msg = Self::new(class_tag);
        msg.recipient = request.sender.clone();
        msg.in_reply_to = Some(request.id.clone());
        msg
    }

    pub fn with_recipient(mut self, recipient: Identifier) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_performative(mut self, performative: Performative) -> Self {
        self.performative = performative;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// `true` for messages whose `classTag`'s last segment names a
    /// registered or otherwise recognized concrete class matching `tag`.
    pub fn is_a(&self, tag: &str) -> bool {
        self.class_tag == tag || self.class_tag.rsplit('.').next() == Some(tag)
    }
}

/// `ParameterReq`: reads or writes one or more named parameters on an agent.
///
/// `value` absent denotes "read"; the first `(param, value?)` pair occupies
/// the scalar slot, subsequent ones accumulate in `requests` — matching the
/// chaining behavior of the original gateway's `ParameterReq.get`/`.set`.
#[derive(Clone, Debug, Default)]
pub struct ParameterReq {
    pub index: i32,
    pub param: Option<String>,
    pub value: Option<Value>,
    pub requests: Vec<(String, Option<Value>)>,
}

pub const CLASS_PARAMETER_REQ: &str = "org.arl.fjage.param.ParameterReq";
pub const CLASS_PARAMETER_RSP: &str = "org.arl.fjage.param.ParameterRsp";

impl ParameterReq {
    pub fn new(index: i32) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Requests a parameter by name (a "read").
    pub fn with_get(mut self, param: &str) -> Self {
        if self.param.is_none() {
            self.param = Some(param.to_string());
        } else {
            self.requests.push((param.to_string(), None));
        }
        self
    }

    /// Requests a parameter write.
    pub fn with_set(mut self, param: &str, value: Value) -> Self {
        if self.param.is_none() && self.value.is_none() {
            self.param = Some(param.to_string());
            self.value = Some(value);
        } else {
            self.requests.push((param.to_string(), Some(value)));
        }
        self
    }

    pub fn into_message(self) -> Message {
        let mut msg = Message::new(CLASS_PARAMETER_REQ);
        msg.fields.insert("index".into(), self.index.into());
        if let Some(param) = &self.param {
            msg.fields.insert("param".into(), param.clone().into());
        }
        if let Some(value) = &self.value {
            msg.fields.insert("value".into(), value.clone());
        }
        if !self.requests.is_empty() {
            let requests: Vec<Value> = self
                .requests
                .iter()
                .map(|(param, value)| {
                    let mut entry = Map::new();
                    entry.insert("param".into(), param.clone().into());
                    if let Some(value) = value {
                        entry.insert("value".into(), value.clone());
                    }
                    Value::Object(entry)
                })
                .collect();
            msg.fields
                .insert("requests".into(), Value::Array(requests));
        }
        msg
    }
}

/// `ParameterRsp`: the reply to a `ParameterReq`.
#[derive(Clone, Debug, Default)]
pub struct ParameterRsp {
    pub index: i32,
    pub param: Option<String>,
    pub value: Option<Value>,
    pub values: HashMap<String, Value>,
    pub readonly: Vec<String>,
}

impl ParameterRsp {
    /// Extracts a `ParameterRsp` view from a decoded message, if its fields
    /// match the shape.
    pub fn from_message(msg: &Message) -> Self {
        let index = msg
            .field("index")
            .and_then(Value::as_i64)
            .map(|v| v as i32)
            .unwrap_or(-1);
        let param = msg
            .field("param")
            .and_then(Value::as_str)
            .map(str::to_string);
        let value = msg.field("value").cloned();
        let values = msg
            .field("values")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let readonly = msg
            .field("readonly")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            index,
            param,
            value,
            values,
            readonly,
        }
    }

    /// Reads a single named parameter's value out of the scalar pair or the
    /// `values` mapping.
    pub fn get(&self, param: &str) -> Option<Value> {
        if self.param.as_deref() == Some(param) {
            return self.value.clone();
        }
        self.values.get(param).cloned()
    }

    /// The full `(param, value) ∪ values` mapping.
    pub fn all(&self) -> HashMap<String, Value> {
        let mut out = self.values.clone();
        if let (Some(param), Some(value)) = (&self.param, &self.value) {
            out.insert(param.clone(), value.clone());
        }
        out
    }

    pub fn is_readonly(&self, param: &str) -> bool {
        self.readonly.iter().any(|p| p == param)
    }
}
