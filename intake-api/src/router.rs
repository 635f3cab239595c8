//! Routes a single-field update to the right reconciliation strategy.
//!
//! Every write goes through a read-merge-write cycle against the record
//! store. There is no transactional guard between the read and the write:
//! two concurrent updates to the same field resolve last-write-wins, while
//! updates to different fields never clobber each other because only the
//! touched field is written back.

use std::sync::Arc;

use chrono::Utc;
use record_store::{FieldValue, FileAttachment, Record, RecordKey, RecordStore, Value};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::errors::{ApiError, ApiResult};
use crate::fields::{DOCUMENTS_FIELD, FieldClass, classify};
use crate::merge::{IncomingDetail, merge_list, merge_scalar, parse_incoming_list};

#[derive(Clone)]
pub struct FieldRouter {
    store: Arc<dyn RecordStore>,
}

impl FieldRouter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        FieldRouter { store }
    }

    /// Reconcile `incoming` against the stored value of `field` and persist
    /// the result. Returns the value that was written.
    pub async fn update_field(
        &self,
        key: &RecordKey,
        field: &str,
        incoming: &JsonValue,
    ) -> ApiResult<FieldValue> {
        if field == DOCUMENTS_FIELD {
            return Err(ApiError::MalformedInput(
                "documents are managed through file upload".into(),
            ));
        }

        let record = self.store.get(key).await?;
        let current = record.as_ref().and_then(|r| r.field(field));
        let now = Utc::now();

        let merged = match classify(field) {
            FieldClass::Raw => FieldValue::Raw(
                Value::try_from(incoming.clone())
                    .map_err(|e| ApiError::MalformedInput(e.to_string()))?,
            ),
            FieldClass::Scalar => {
                // A stored value of the wrong shape is treated as absent so
                // the write assigns a fresh identity rather than failing.
                let stored = match current {
                    Some(FieldValue::One(detail)) => Some(detail),
                    _ => None,
                };
                let parsed = IncomingDetail::from_json(incoming)?;
                FieldValue::One(merge_scalar(stored, &parsed, now)?)
            }
            FieldClass::List => {
                let stored: &[_] = match current {
                    Some(FieldValue::Many(details)) => details,
                    _ => &[],
                };
                let parsed = parse_incoming_list(incoming)?;
                FieldValue::Many(merge_list(stored, &parsed, now)?)
            }
        };

        debug!(field, email = %key.email, "writing reconciled field");
        self.store.update_field(key, field, merged.clone()).await?;
        Ok(merged)
    }

    /// Append a document entry to the record's document list.
    pub async fn attach_document(
        &self,
        key: &RecordKey,
        attachment: FileAttachment,
    ) -> ApiResult<Vec<FileAttachment>> {
        let record = self.store.get(key).await?;
        let mut documents: Vec<FileAttachment> = record
            .as_ref()
            .and_then(|r| r.field(DOCUMENTS_FIELD))
            .and_then(FieldValue::as_documents)
            .map(<[_]>::to_vec)
            .unwrap_or_default();

        documents.push(attachment);
        self.store
            .update_field(key, DOCUMENTS_FIELD, FieldValue::Documents(documents.clone()))
            .await?;
        Ok(documents)
    }

    /// Remove every document matching the (name, type) pair. Removing from
    /// an empty or absent list writes back an empty list.
    pub async fn delete_document(
        &self,
        key: &RecordKey,
        document_name: &str,
        document_type: &str,
    ) -> ApiResult<Vec<FileAttachment>> {
        let record = self.store.get(key).await?;
        let documents: Vec<FileAttachment> = record
            .as_ref()
            .and_then(|r| r.field(DOCUMENTS_FIELD))
            .and_then(FieldValue::as_documents)
            .map(<[_]>::to_vec)
            .unwrap_or_default();

        let remaining: Vec<FileAttachment> = documents
            .into_iter()
            .filter(|doc| {
                doc.document_name != document_name || doc.document_type != document_type
            })
            .collect();

        self.store
            .update_field(key, DOCUMENTS_FIELD, FieldValue::Documents(remaining.clone()))
            .await?;
        Ok(remaining)
    }

    /// Fetch the record, redacted for client consumption.
    pub async fn fetch_redacted(&self, key: &RecordKey) -> ApiResult<Record> {
        match self.store.get(key).await? {
            Some(record) => Ok(record.redacted()),
            None => Ok(Record::new(key.email.clone(), key.application_id.clone())),
        }
    }
}
