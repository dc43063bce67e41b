//! HTTP store client backed by `reqwest`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use dynabatch_core::{Item, StoreClient, StoreError};

use crate::config::HttpStoreConfig;
use crate::error::HttpConfigError;
use crate::protocol::{
    classify_error, BatchGetRequest, BatchGetResponse, BatchWriteRequest, BatchWriteResponse,
    CONTENT_TYPE, TARGET_BATCH_GET, TARGET_BATCH_WRITE,
};

/// Store client for a DynamoDB-compatible HTTP endpoint.
pub struct HttpStore {
    endpoint: String,
    authorization: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, HttpConfigError> {
        let request_timeout = config.request_timeout();
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| HttpConfigError::Client(e.to_string()))?;

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/19700101/{}/dynamodb/aws4_request, \
             SignedHeaders=content-type;host;x-amz-target, Signature=0",
            config.access_key_id, config.region
        );

        Ok(Self {
            endpoint: config.endpoint,
            authorization,
            http,
            request_timeout,
        })
    }

    /// Build from the process environment (see [`HttpStoreConfig::from_env`]).
    pub fn from_env() -> Result<Self, HttpConfigError> {
        Self::new(HttpStoreConfig::from_env()?)
    }

    async fn post<B, R>(&self, target: &str, body: &B) -> Result<R, StoreError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| StoreError::Other(e.to_string()))?;

        let resp = self
            .http
            .post(&self.endpoint)
            .header("X-Amz-Target", target)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .body(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let err = classify_error(status.as_u16(), &text);
            tracing::debug!(operation = target, status = status.as_u16(), error = %err, "store call rejected");
            return Err(err);
        }

        serde_json::from_str(&text).map_err(|e| StoreError::Deserialization(e.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout {
                ms: u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            StoreError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl StoreClient for HttpStore {
    async fn read_many(&self, table: &str, keys: Vec<Item>) -> Result<Vec<Item>, StoreError> {
        let resp: BatchGetResponse = self
            .post(TARGET_BATCH_GET, &BatchGetRequest::new(table, keys))
            .await?;
        resp.into_records(table)
    }

    async fn write_many(&self, table: &str, items: Vec<Item>) -> Result<(), StoreError> {
        let resp: BatchWriteResponse = self
            .post(TARGET_BATCH_WRITE, &BatchWriteRequest::new(table, items))
            .await?;
        resp.check()
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}
