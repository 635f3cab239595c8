//! Payment provider webhook. Authenticated by an HMAC signature over the
//! raw body rather than an id token, since the caller is the provider's
//! backend, not a user.

use chrono::Utc;
use hmac::{Hmac, Mac};
use record_store::RecordKey;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};

use crate::errors::{ApiError, ApiResult};
use crate::service::AppState;

pub const SIGNATURE_HEADER: &str = "x-intake-signature";

const COMPLETED_EVENT: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub email: String,
    pub application_id: String,
}

/// Constant-time check of the hex signature against HMAC-SHA256 of the body.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

pub async fn handle(
    state: &AppState,
    body: &[u8],
    signature_hex: &str,
) -> ApiResult<serde_json::Value> {
    if !verify_signature(&state.webhook_secret, body, signature_hex) {
        return Err(ApiError::InvalidSignature);
    }

    let event: WebhookEvent = serde_json::from_slice(body)
        .map_err(|e| ApiError::MalformedInput(format!("invalid webhook payload: {e}")))?;

    if event.kind == COMPLETED_EVENT {
        let key = RecordKey::new(event.data.email, event.data.application_id);
        state
            .router
            .update_field(&key, "submitted_date", &json!(Utc::now().to_rfc3339()))
            .await?;
        info!(email = %key.email, "marked application submitted");

        // Notification failures must not bounce the webhook: the payment
        // has already happened and the provider would retry forever.
        if let Some(notifier) = &state.notifier {
            match state.router.fetch_redacted(&key).await {
                Ok(record) => {
                    if let Err(err) = notifier.notify_submitted(&record).await {
                        warn!(error = %err, "submission notification failed");
                    }
                }
                Err(err) => warn!(error = %err, "could not load record for notification"),
            }
        }
    }

    Ok(json!({ "received": true }))
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
