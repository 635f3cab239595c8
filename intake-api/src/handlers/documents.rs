//! File upload and deletion. Contents arrive base64 encoded in the JSON
//! envelope; the decoded bytes go to the blob store and only the metadata
//! lands in the record.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use record_store::{FileAttachment, RecordKey, new_detail_id};
use serde_json::json;
use tracing::info;

use crate::errors::{ApiError, ApiResult};
use crate::handlers::{DeleteFileRequest, UploadFileRequest};
use crate::service::AppState;

pub async fn handle_upload(
    state: &AppState,
    email: &str,
    request: UploadFileRequest,
) -> ApiResult<serde_json::Value> {
    let bytes = STANDARD
        .decode(&request.file_contents)
        .map_err(|_| ApiError::MalformedInput("file_contents is not valid base64".into()))?;

    let size_mb = bytes.len() as u64 / (1024 * 1024);
    if size_mb >= state.max_file_size_mb {
        return Err(ApiError::MalformedInput(format!(
            "file exceeds the {} MB limit",
            state.max_file_size_mb
        )));
    }

    let key = RecordKey::new(email, request.application_id);
    let object_key = format!(
        "{}/{}/{}/{}",
        key.email, key.application_id, request.document_type, request.file_name
    );
    let location = state.blob.put(&object_key, &bytes).await?;
    metrics::histogram!(crate::metrics_defs::UPLOAD_BYTES).record(bytes.len() as f64);
    info!(document = %request.file_name, "stored uploaded file");

    let attachment = FileAttachment {
        uuid: new_detail_id(),
        created_date: Utc::now(),
        document_type: request.document_type,
        document_name: request.file_name,
        s3_location: Some(location),
        associated_medicaid_detail_uuid: request.associated_detail_id,
        tags: request.tags,
    };

    let documents = state.router.attach_document(&key, attachment).await?;
    Ok(json!({ "documents": documents }))
}

pub async fn handle_delete(
    state: &AppState,
    email: &str,
    request: DeleteFileRequest,
) -> ApiResult<serde_json::Value> {
    let key = RecordKey::new(email, request.application_id);
    let documents = state
        .router
        .delete_document(&key, &request.file_name, &request.document_type)
        .await?;
    Ok(json!({ "documents": documents }))
}
