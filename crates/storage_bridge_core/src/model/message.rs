//! Host message envelopes.
//!
//! # Responsibility
//! - Name the inbound/outbound messages exchanged with content scripts.
//! - Decode inbound `userInfo` payloads field by field.
//! - Encode outbound payloads in the shape scripts expect.
//!
//! # Invariants
//! - Decoding never fails: a missing or mistyped field decodes to `None`.
//! - A list field holding any non-string element is treated as mistyped.
//! - Outbound payload shapes are stable; scripts match on field names.

use crate::model::namespace::Namespace;
use crate::model::value::{value_map_from_json, value_map_to_json, ValueMap};
use serde_json::{json, Map, Value};

pub const MESSAGE_GET: &str = "get";
pub const MESSAGE_SET: &str = "set";
pub const MESSAGE_REMOVE: &str = "remove";
pub const MESSAGE_CLEAR: &str = "clear";
pub const MESSAGE_MESSAGE: &str = "message";

pub const MESSAGE_GET_RESPONSE: &str = "get-response";
pub const MESSAGE_SET_RESPONSE: &str = "set-response";
pub const MESSAGE_STORAGE_CHANGE: &str = "storage-change";

/// Inbound operation kind, taken from the host message name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Get,
    Set,
    Remove,
    Clear,
    /// Side-channel request carrying `openUrls`.
    Message,
}

impl MessageKind {
    /// Parses a host message name; `None` for names outside the dispatch table.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            MESSAGE_GET => Some(Self::Get),
            MESSAGE_SET => Some(Self::Set),
            MESSAGE_REMOVE => Some(Self::Remove),
            MESSAGE_CLEAR => Some(Self::Clear),
            MESSAGE_MESSAGE => Some(Self::Message),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => MESSAGE_GET,
            Self::Set => MESSAGE_SET,
            Self::Remove => MESSAGE_REMOVE,
            Self::Clear => MESSAGE_CLEAR,
            Self::Message => MESSAGE_MESSAGE,
        }
    }
}

/// Decoded `values` field.
///
/// `set` submits a record, `remove` submits a key list under the same name.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeValues {
    Record(ValueMap),
    Keys(Vec<String>),
}

/// Inbound request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestEnvelope {
    /// Correlation token; responses are only sent when present.
    pub id: Option<String>,
    pub namespace: Option<String>,
    /// `get` key selection; `None` selects every key.
    pub keys: Option<Vec<String>>,
    pub values: Option<EnvelopeValues>,
    /// `message` payload (wire name `openUrls`).
    pub open_urls: Option<Vec<String>>,
}

impl RequestEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a host `userInfo` object.
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        Self {
            id: payload.get("id").and_then(Value::as_str).map(str::to_string),
            namespace: payload
                .get("namespace")
                .and_then(Value::as_str)
                .map(str::to_string),
            keys: payload.get("keys").and_then(string_list),
            values: payload.get("values").and_then(envelope_values),
            open_urls: payload.get("openUrls").and_then(string_list),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_record(mut self, values: ValueMap) -> Self {
        self.values = Some(EnvelopeValues::Record(values));
        self
    }

    pub fn with_key_list<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(EnvelopeValues::Keys(
            keys.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn with_open_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.open_urls = Some(urls.into_iter().map(Into::into).collect());
        self
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn envelope_values(value: &Value) -> Option<EnvelopeValues> {
    match value {
        Value::Object(object) => Some(EnvelopeValues::Record(value_map_from_json(object))),
        Value::Array(_) => string_list(value).map(EnvelopeValues::Keys),
        _ => None,
    }
}

/// `new` side of a change event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangePayload {
    /// Submitted values (`set`) or an empty record (`clear`).
    Values(ValueMap),
    /// Removed keys (`remove`); values are not reported.
    Keys(Vec<String>),
}

/// Storage change broadcast after one successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub namespace: Namespace,
    /// Pre-image of exactly the touched keys that were present.
    pub old: ValueMap,
    pub new: ChangePayload,
}

impl ChangeEvent {
    /// Keys touched by the triggering operation, as reported in `new`.
    pub fn touched_keys(&self) -> Vec<String> {
        match &self.new {
            ChangePayload::Values(values) => values.keys().cloned().collect(),
            ChangePayload::Keys(keys) => keys.clone(),
        }
    }
}

/// Message dispatched from the host to one page script.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    GetResponse { id: String, value: ValueMap },
    /// Acknowledges `set`, `remove` and `clear`.
    SetResponse { id: String },
    StorageChange(ChangeEvent),
}

impl OutboundMessage {
    /// Host message name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetResponse { .. } => MESSAGE_GET_RESPONSE,
            Self::SetResponse { .. } => MESSAGE_SET_RESPONSE,
            Self::StorageChange(_) => MESSAGE_STORAGE_CHANGE,
        }
    }

    /// Host `userInfo` payload.
    pub fn user_info(&self) -> Value {
        match self {
            Self::GetResponse { id, value } => json!({
                "id": id,
                "value": value_map_to_json(value),
            }),
            Self::SetResponse { id } => json!({ "id": id }),
            Self::StorageChange(event) => {
                let new = match &event.new {
                    ChangePayload::Values(values) => value_map_to_json(values),
                    ChangePayload::Keys(keys) => json!(keys),
                };
                json!({
                    "old": value_map_to_json(&event.old),
                    "new": new,
                    "namespace": event.namespace.as_str(),
                })
            }
        }
    }
}

/// Delivery endpoint for outbound messages (one page, tab or window).
///
/// Implementations must not call back into the router synchronously:
/// change events are delivered while the namespace is held.
pub trait MessageSink: Send + Sync {
    fn dispatch(&self, message: OutboundMessage);
}
