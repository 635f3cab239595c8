use crate::store::{RecordKey, RecordStore, StoreError};
use crate::types::{FieldValue, Record};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-process store for tests and local development.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<RecordKey, Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(records.get(key).cloned())
    }

    async fn update_field(
        &self,
        key: &RecordKey,
        field: &str,
        value: FieldValue,
    ) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let record = records
            .entry(key.clone())
            .or_insert_with(|| Record::new(&key.email, &key.application_id));
        record.fields.insert(field.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        records.remove(key);
        Ok(())
    }
}
