//! Action handlers. Requests arrive as a JSON envelope with an `action`
//! discriminator plus an `id_token`; each handler deserializes its own
//! typed payload from the same envelope.

pub mod documents;
pub mod get_details;
pub mod payment;
pub mod update_details;

use serde::Deserialize;
use std::collections::BTreeSet;

/// First-pass look at the envelope, before the action is known.
#[derive(Debug, Deserialize)]
pub struct Probe {
    pub action: String,
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GetDetailsRequest {
    pub application_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDetailsRequest {
    pub application_id: String,
    pub key_to_update: String,
    pub value_to_update: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UploadFileRequest {
    pub application_id: String,
    pub file_name: String,
    pub document_type: String,
    /// Base64 encoded file contents.
    pub file_contents: String,
    #[serde(default)]
    pub associated_detail_id: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    pub application_id: String,
    pub file_name: String,
    pub document_type: String,
}
