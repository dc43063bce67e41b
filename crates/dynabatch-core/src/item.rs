//! Store wire types.
//!
//! Attribute values serialize in the DynamoDB JSON protocol shape, e.g.
//! `{"S": "alice"}` or `{"N": "42"}`, so the same types are used on the HTTP
//! wire and in memory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A record or a key: attribute name → value.
pub type Item = BTreeMap<String, AttributeValue>;

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    String(String),
    /// Numbers travel as decimal strings to avoid precision loss.
    #[serde(rename = "N")]
    Number(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "L")]
    List(Vec<AttributeValue>),
    #[serde(rename = "M")]
    Map(BTreeMap<String, AttributeValue>),
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
}

impl AttributeValue {
    /// Short type descriptor as used by the wire protocol.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::String(_) => "S",
            Self::Number(_) => "N",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::List(_) => "L",
            Self::Map(_) => "M",
            Self::StringSet(_) => "SS",
            Self::NumberSet(_) => "NS",
        }
    }

    /// Returns the scalar text of a value usable as a key attribute.
    ///
    /// Only strings and numbers can be key attributes.
    pub fn as_key_fragment(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Number(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::Number(n.to_string())
    }
}

impl From<u64> for AttributeValue {
    fn from(n: u64) -> Self {
        Self::Number(n.to_string())
    }
}

/// Build a `pk`/`sk` composite key item.
pub fn key(pk: impl Into<String>, sk: impl Into<String>) -> Item {
    let mut item = Item::new();
    item.insert("pk".into(), AttributeValue::String(pk.into()));
    item.insert("sk".into(), AttributeValue::String(sk.into()));
    item
}
