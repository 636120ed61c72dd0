//! Typed view of the proxy engine configuration.
//!
//! Only the parts the remapper looks at are typed: the `inbounds` list and
//! each inbound's `tag` and `port`. Everything else is carried through
//! `extra_fields` untouched so the document serializes back with the same
//! content. A field that is present but `null` stays present.
//!
//! # Example
//! ```json
//! {
//!   "log": {"loglevel": "warning"},
//!   "inbounds": [
//!     {"tag": "vless", "port": 443, "protocol": "vless", "settings": {...}},
//!     {"tag": "http", "port": "80", "protocol": "http"}
//!   ],
//!   "outbounds": [...]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProxyConfigDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbounds: Option<Inbounds>,

    /// Top-level fields other than `inbounds` (`log`, `outbounds`, `routing`, ...).
    #[serde(flatten)]
    pub extra_fields: Map<String, JsonValue>,
}

impl ProxyConfigDocument {
    /// Inbound entries that are JSON objects, in document order.
    ///
    /// Yields nothing when `inbounds` is missing or is not an array.
    pub fn listeners(&self) -> impl Iterator<Item = &Inbound> {
        self.inbounds
            .iter()
            .filter_map(Inbounds::entries)
            .flatten()
            .filter_map(InboundEntry::as_listener)
    }

    pub fn listeners_mut(&mut self) -> impl Iterator<Item = &mut Inbound> {
        self.inbounds
            .iter_mut()
            .filter_map(Inbounds::entries_mut)
            .flatten()
            .filter_map(InboundEntry::as_listener_mut)
    }
}

impl From<Map<String, JsonValue>> for ProxyConfigDocument {
    fn from(mut fields: Map<String, JsonValue>) -> Self {
        let inbounds = fields.shift_remove("inbounds").map(Inbounds::from);
        ProxyConfigDocument {
            inbounds,
            extra_fields: fields,
        }
    }
}

impl From<ProxyConfigDocument> for JsonValue {
    fn from(document: ProxyConfigDocument) -> Self {
        let mut fields = Map::new();
        if let Some(inbounds) = document.inbounds {
            fields.insert("inbounds".to_string(), inbounds.into());
        }
        fields.extend(document.extra_fields);
        JsonValue::Object(fields)
    }
}

impl<'de> Deserialize<'de> for ProxyConfigDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, JsonValue>::deserialize(deserializer).map(Self::from)
    }
}

/// The `inbounds` field, tolerating documents where it is not an array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Inbounds {
    Listeners(Vec<InboundEntry>),
    Malformed(JsonValue),
}

impl Inbounds {
    pub fn entries(&self) -> Option<&Vec<InboundEntry>> {
        match self {
            Inbounds::Listeners(entries) => Some(entries),
            Inbounds::Malformed(_) => None,
        }
    }

    pub fn entries_mut(&mut self) -> Option<&mut Vec<InboundEntry>> {
        match self {
            Inbounds::Listeners(entries) => Some(entries),
            Inbounds::Malformed(_) => None,
        }
    }
}

impl From<JsonValue> for Inbounds {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Array(items) => {
                Inbounds::Listeners(items.into_iter().map(InboundEntry::from).collect())
            }
            other => Inbounds::Malformed(other),
        }
    }
}

impl From<Inbounds> for JsonValue {
    fn from(inbounds: Inbounds) -> Self {
        match inbounds {
            Inbounds::Listeners(entries) => {
                JsonValue::Array(entries.into_iter().map(JsonValue::from).collect())
            }
            Inbounds::Malformed(value) => value,
        }
    }
}

impl<'de> Deserialize<'de> for Inbounds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Self::from)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InboundEntry {
    Listener(Inbound),
    /// Array members that are not objects.
    Other(JsonValue),
}

impl InboundEntry {
    pub fn as_listener(&self) -> Option<&Inbound> {
        match self {
            InboundEntry::Listener(inbound) => Some(inbound),
            InboundEntry::Other(_) => None,
        }
    }

    pub fn as_listener_mut(&mut self) -> Option<&mut Inbound> {
        match self {
            InboundEntry::Listener(inbound) => Some(inbound),
            InboundEntry::Other(_) => None,
        }
    }
}

impl From<JsonValue> for InboundEntry {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(fields) => InboundEntry::Listener(Inbound::from(fields)),
            other => InboundEntry::Other(other),
        }
    }
}

impl From<InboundEntry> for JsonValue {
    fn from(entry: InboundEntry) -> Self {
        match entry {
            InboundEntry::Listener(inbound) => inbound.into(),
            InboundEntry::Other(value) => value,
        }
    }
}

impl<'de> Deserialize<'de> for InboundEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Self::from)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inbound {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<JsonValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortValue>,

    /// `protocol`, `listen`, `settings`, `streamSettings`, ...
    #[serde(flatten)]
    pub extra_fields: Map<String, JsonValue>,
}

impl Inbound {
    /// The inbound's tag, or an empty string when it is missing or not a string.
    pub fn tag(&self) -> &str {
        self.tag
            .as_ref()
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
    }
}

impl From<Map<String, JsonValue>> for Inbound {
    fn from(mut fields: Map<String, JsonValue>) -> Self {
        let tag = fields.shift_remove("tag");
        let port = fields.shift_remove("port").map(PortValue::from);
        Inbound {
            tag,
            port,
            extra_fields: fields,
        }
    }
}

impl From<Inbound> for JsonValue {
    fn from(inbound: Inbound) -> Self {
        let mut fields = Map::new();
        if let Some(tag) = inbound.tag {
            fields.insert("tag".to_string(), tag);
        }
        if let Some(port) = inbound.port {
            fields.insert("port".to_string(), port.into());
        }
        fields.extend(inbound.extra_fields);
        JsonValue::Object(fields)
    }
}

/// An inbound `port` as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(Number),
    Text(String),
    Other(JsonValue),
}

impl PortValue {
    /// Reads the value as a single port number.
    ///
    /// Integers are taken as-is, floats are truncated toward zero and strings
    /// must be a plain base-10 integer. Anything else, including zero, means
    /// the inbound has no usable port (e.g. Xray port ranges like `"1000-2000"`).
    pub fn as_port(&self) -> Option<i64> {
        let port = match self {
            PortValue::Number(number) => match number.as_i64() {
                Some(n) => Some(n),
                None => number
                    .as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64),
            },
            PortValue::Text(text) => text.parse::<i64>().ok(),
            PortValue::Other(_) => None,
        };
        port.filter(|port| *port != 0)
    }
}

impl From<JsonValue> for PortValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Number(number) => PortValue::Number(number),
            JsonValue::String(text) => PortValue::Text(text),
            other => PortValue::Other(other),
        }
    }
}

impl From<PortValue> for JsonValue {
    fn from(port: PortValue) -> Self {
        match port {
            PortValue::Number(number) => JsonValue::Number(number),
            PortValue::Text(text) => JsonValue::String(text),
            PortValue::Other(value) => value,
        }
    }
}

impl From<u16> for PortValue {
    fn from(port: u16) -> Self {
        PortValue::Number(port.into())
    }
}
