//! Conversion between serde domain types and store items.
//!
//! Any `Serialize` value whose JSON form is an object can be marshalled into
//! an [`Item`]; anything else (a bare string, number, array) is rejected with
//! [`MarshalError::NotAnObject`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::MarshalError;
use crate::item::{AttributeValue, Item};

/// Marshal a domain value into a store item.
pub fn to_item<T: Serialize + ?Sized>(value: &T) -> Result<Item, MarshalError> {
    let json = serde_json::to_value(value).map_err(|e| MarshalError::Serialize(e.to_string()))?;
    match json {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(name, v)| (name, to_attribute(v)))
            .collect()),
        other => Err(MarshalError::NotAnObject {
            found: json_kind(&other),
        }),
    }
}

/// Unmarshal a store item into a domain value.
pub fn from_item<T: DeserializeOwned>(item: &Item) -> Result<T, MarshalError> {
    let mut map = Map::with_capacity(item.len());
    for (name, value) in item {
        map.insert(name.clone(), to_json(value)?);
    }
    serde_json::from_value(Value::Object(map)).map_err(|e| MarshalError::Deserialize(e.to_string()))
}

fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::Number(n.to_string()),
        Value::String(s) => AttributeValue::String(s),
        Value::Array(values) => AttributeValue::List(values.into_iter().map(to_attribute).collect()),
        Value::Object(map) => {
            AttributeValue::Map(map.into_iter().map(|(k, v)| (k, to_attribute(v))).collect())
        }
    }
}

fn to_json(value: &AttributeValue) -> Result<Value, MarshalError> {
    Ok(match value {
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::Number(n) => Value::Number(parse_number(n)?),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::List(values) => {
            Value::Array(values.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        AttributeValue::Map(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), to_json(v)?);
            }
            Value::Object(out)
        }
        AttributeValue::StringSet(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::NumberSet(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<Result<_, _>>()?,
        ),
    })
}

fn parse_number(text: &str) -> Result<Number, MarshalError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Number(n)) => Ok(n),
        _ => Err(MarshalError::InvalidNumber(text.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
