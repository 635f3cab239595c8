use crate::store::{RecordKey, RecordStore, StoreError};
use crate::types::{FieldValue, Record};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tokio::time::{Duration, sleep};

const BASE_DELAY_MILLIS: u64 = 250;
const MAX_READ_RETRIES: u32 = 3;

const RETRIABLE_STATUS_CODES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,     // 429
    StatusCode::INTERNAL_SERVER_ERROR, // 500
    StatusCode::BAD_GATEWAY,           // 502
    StatusCode::SERVICE_UNAVAILABLE,   // 503
    StatusCode::GATEWAY_TIMEOUT,       // 504
];

/// Record store backed by an HTTP table service.
///
/// Reads retry transient upstream failures with exponential backoff. Writes
/// are sent exactly once: the caller's read snapshot may already be stale,
/// and retrying a write would only widen that window.
pub struct RestRecordStore {
    client: reqwest::Client,
    base_url: Url,
}

impl RestRecordStore {
    pub fn new(base_url: Url) -> Self {
        RestRecordStore {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn record_url(&self, key: &RecordKey) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Malformed("base url cannot carry path segments".to_string()))?
            .pop_if_empty()
            .extend(["records", &key.email, &key.application_id]);
        Ok(url)
    }

    fn field_url(&self, key: &RecordKey, field: &str) -> Result<Url, StoreError> {
        let mut url = self.record_url(key)?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Malformed("base url cannot carry path segments".to_string()))?
            .extend(["fields", field]);
        Ok(url)
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError> {
        let url = self.record_url(key)?;
        let mut retries = 0;

        loop {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

            match response.status() {
                StatusCode::NOT_FOUND => return Ok(None),
                status if status.is_success() => {
                    let record = response
                        .json::<Record>()
                        .await
                        .map_err(|e| StoreError::Malformed(e.to_string()))?;
                    return Ok(Some(record));
                }
                status if RETRIABLE_STATUS_CODES.contains(&status) && retries < MAX_READ_RETRIES => {
                    let delay = BASE_DELAY_MILLIS * 2_u64.pow(retries);
                    tracing::warn!(%status, retries, "record read failed, backing off");
                    sleep(Duration::from_millis(delay)).await;
                    retries += 1;
                }
                status => {
                    return Err(StoreError::Unavailable(format!(
                        "record read failed with status {status}"
                    )));
                }
            }
        }
    }

    async fn update_field(
        &self,
        key: &RecordKey,
        field: &str,
        value: FieldValue,
    ) -> Result<(), StoreError> {
        let url = self.field_url(key, field)?;
        let response = self
            .client
            .put(url)
            .json(&value)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "field write failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        let url = self.record_url(key)?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(StoreError::Unavailable(format!(
                "record delete failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
