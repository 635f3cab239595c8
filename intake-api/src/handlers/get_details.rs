use record_store::RecordKey;
use serde_json::json;

use crate::errors::ApiResult;
use crate::handlers::GetDetailsRequest;
use crate::service::AppState;

pub async fn handle(
    state: &AppState,
    email: &str,
    request: GetDetailsRequest,
) -> ApiResult<serde_json::Value> {
    let key = RecordKey::new(email, request.application_id);
    let record = state.router.fetch_redacted(&key).await?;
    Ok(json!({ "record": record }))
}
