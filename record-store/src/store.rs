use crate::types::{FieldValue, Record};
use async_trait::async_trait;

/// Composite key for every record operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub email: String,
    pub application_id: String,
}

impl RecordKey {
    pub fn new(email: impl Into<String>, application_id: impl Into<String>) -> Self {
        RecordKey {
            email: email.into(),
            application_id: application_id.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed record payload: {0}")]
    Malformed(String),
}

/// Durable key-value access for records.
///
/// `update_field` is a single-field upsert: the whole field value is written
/// in one call and the record is created implicitly if absent. There is no
/// transactional guard between a `get` and a later `update_field`; callers
/// that read-merge-write race each other last-write-wins at field
/// granularity.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError>;

    async fn update_field(
        &self,
        key: &RecordKey,
        field: &str,
        value: FieldValue,
    ) -> Result<(), StoreError>;

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError>;
}
