//! Persisted record model.
//!
//! A `Record` is the per-(email, application) aggregate: a map from field
//! name to either one `Detail`, an ordered list of `Detail`s, an ordered
//! list of `FileAttachment`s (the `documents` field), or a raw `Value` for
//! fields that bypass reconciliation (e.g. `submitted_date`).
//!
//! Wire names are fixed by existing clients and must not change:
//! a `Detail` serializes with keys `id`, `created_date`, `updated_date`,
//! `value` (plus `type` for non-plain kinds); a `FileAttachment` with keys
//! `uuid`, `created_date`, `document_type`, `document_name`, `s3_location`,
//! `associated_medicaid_detail_uuid` and optional `tags`.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Opaque detail identifier: 32 lowercase hex characters.
pub type DetailId = String;

/// Generates a fresh globally-unique detail id.
pub fn new_detail_id() -> DetailId {
    Uuid::new_v4().simple().to_string()
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValueError {
    #[error("null is not a storable value")]
    Null,
}

/// Closed sum type for field payloads. Arbitrary nesting is allowed but
/// nulls are rejected at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ValueError;

    fn try_from(value: serde_json::Value) -> Result<Self, ValueError> {
        match value {
            serde_json::Value::Null => Err(ValueError::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => Ok(Value::Number(n)),
            serde_json::Value::String(s) => Ok(Value::String(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Value::try_from)
                .collect::<Result<_, _>>()
                .map(Value::List),
            serde_json::Value::Object(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((k, Value::try_from(v)?)))
                .collect::<Result<_, _>>()
                .map(Value::Map),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Discriminator carried through for downstream consumers; the merge engine
/// itself never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailKind {
    #[default]
    Plain,
    UserInfo,
    FileAttachment,
}

impl DetailKind {
    pub fn is_plain(&self) -> bool {
        matches!(self, DetailKind::Plain)
    }
}

/// One field value wrapped with its identity and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub id: DetailId,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    pub value: Value,
    #[serde(rename = "type", default, skip_serializing_if = "DetailKind::is_plain")]
    pub kind: DetailKind,
}

/// Metadata for an uploaded blob, attached to the `documents` field.
///
/// `associated_medicaid_detail_uuid` is a non-owning back-reference to the
/// `Detail` the file belongs to; it is used only for lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub uuid: DetailId,
    pub created_date: DateTime<Utc>,
    pub document_type: String,
    pub document_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_location: Option<String>,
    #[serde(default)]
    pub associated_medicaid_detail_uuid: Option<DetailId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
}

/// The shapes a stored field can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    One(Detail),
    Many(Vec<Detail>),
    Documents(Vec<FileAttachment>),
    Raw(Value),
}

impl FieldValue {
    /// Document list view of this field. An empty list deserializes as
    /// `Many([])`, so both shapes count as "no documents".
    pub fn as_documents(&self) -> Option<&[FileAttachment]> {
        match self {
            FieldValue::Documents(docs) => Some(docs),
            FieldValue::Many(details) if details.is_empty() => Some(&[]),
            _ => None,
        }
    }
}

/// Per-(email, application) aggregate. Created implicitly on first write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub email: String,
    pub application_id: String,
    #[serde(flatten)]
    pub fields: IndexMap<String, FieldValue>,
}

impl Record {
    pub fn new(email: impl Into<String>, application_id: impl Into<String>) -> Self {
        Record {
            email: email.into(),
            application_id: application_id.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Copy of this record with blob locations stripped from every document
    /// attachment. Used for anything returned to a client.
    pub fn redacted(mut self) -> Self {
        for value in self.fields.values_mut() {
            if let FieldValue::Documents(docs) = value {
                for doc in docs {
                    doc.s3_location = None;
                }
            }
        }
        self
    }
}
