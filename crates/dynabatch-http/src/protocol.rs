//! DynamoDB JSON protocol bodies for the two batch operations, and mapping
//! of service error bodies onto [`StoreError`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use dynabatch_core::{Item, StoreError};

pub const TARGET_BATCH_GET: &str = "DynamoDB_20120810.BatchGetItem";
pub const TARGET_BATCH_WRITE: &str = "DynamoDB_20120810.BatchWriteItem";
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeysAndAttributes {
    pub keys: Vec<Item>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetRequest<'a> {
    pub request_items: BTreeMap<&'a str, KeysAndAttributes>,
}

impl<'a> BatchGetRequest<'a> {
    pub fn new(table: &'a str, keys: Vec<Item>) -> Self {
        Self {
            request_items: BTreeMap::from([(table, KeysAndAttributes { keys })]),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BatchGetResponse {
    pub responses: HashMap<String, Vec<Item>>,
    pub unprocessed_keys: HashMap<String, KeysAndAttributes>,
}

impl BatchGetResponse {
    /// Records for `table`, or `Unprocessed` if the service deferred keys.
    pub fn into_records(mut self, table: &str) -> Result<Vec<Item>, StoreError> {
        let unprocessed: usize = self.unprocessed_keys.values().map(|k| k.keys.len()).sum();
        if unprocessed > 0 {
            return Err(StoreError::Unprocessed { count: unprocessed });
        }
        Ok(self.responses.remove(table).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRequest {
    pub item: Item,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteRequest {
    pub put_request: PutRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteRequest<'a> {
    pub request_items: BTreeMap<&'a str, Vec<WriteRequest>>,
}

impl<'a> BatchWriteRequest<'a> {
    pub fn new(table: &'a str, items: Vec<Item>) -> Self {
        let puts = items
            .into_iter()
            .map(|item| WriteRequest { put_request: PutRequest { item } })
            .collect();
        Self {
            request_items: BTreeMap::from([(table, puts)]),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BatchWriteResponse {
    pub unprocessed_items: HashMap<String, Vec<serde_json::Value>>,
}

impl BatchWriteResponse {
    pub fn check(&self) -> Result<(), StoreError> {
        let unprocessed: usize = self.unprocessed_items.values().map(Vec::len).sum();
        if unprocessed > 0 {
            return Err(StoreError::Unprocessed { count: unprocessed });
        }
        Ok(())
    }
}

/// Service error body: `{"__type": "...#ValidationException", "message": "..."}`.
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// Map a non-2xx response onto a store error.
pub fn classify_error(status: u16, body: &str) -> StoreError {
    let Ok(parsed) = serde_json::from_str::<ServiceError>(body) else {
        return StoreError::Http(format!("HTTP {status}: {body}"));
    };
    let code = parsed.kind.rsplit('#').next().unwrap_or_default().to_string();
    match code.as_str() {
        "ProvisionedThroughputExceededException" | "ThrottlingException" | "RequestLimitExceeded" => {
            StoreError::Throttled { message: parsed.message }
        }
        "ValidationException" => StoreError::Validation(parsed.message),
        "" => StoreError::Http(format!("HTTP {status}: {}", parsed.message)),
        _ => StoreError::Rejected { code, message: parsed.message },
    }
}
