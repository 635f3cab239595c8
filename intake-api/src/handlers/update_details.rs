use record_store::RecordKey;
use serde_json::json;

use crate::errors::ApiResult;
use crate::handlers::UpdateDetailsRequest;
use crate::service::AppState;

pub async fn handle(
    state: &AppState,
    email: &str,
    request: UpdateDetailsRequest,
) -> ApiResult<serde_json::Value> {
    let key = RecordKey::new(email, request.application_id);
    state
        .router
        .update_field(&key, &request.key_to_update, &request.value_to_update)
        .await?;

    // Return the whole record so the client sees server-assigned ids and
    // timestamps without a second round trip.
    let record = state.router.fetch_redacted(&key).await?;
    Ok(json!({ "record": record }))
}
