//! Shared fixtures for crate tests.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use record_store::{MemoryBlobStore, MemoryRecordStore};
use sha2::Sha256;

use crate::auth::{AuthError, Claims, TokenVerifier, make_test_token};
use crate::email::{EmailError, EmailMessage, EmailSender, SubmissionNotifier};
use crate::router::FieldRouter;
use crate::service::AppState;

pub(crate) const TEST_TOKEN_SECRET: &[u8] = b"unit-test-token-secret";
pub(crate) const TEST_WEBHOOK_SECRET: &str = "unit-test-webhook-secret";

pub(crate) fn test_token(email: &str) -> String {
    make_test_token(
        TEST_TOKEN_SECRET,
        "test-key",
        email,
        Utc::now().timestamp() + 3600,
    )
}

/// In-process verifier for the tokens `test_token` mints. Same signature
/// and expiry checks as the real one, minus the key set fetch.
pub(crate) struct StaticVerifier;

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (message, signature_b64) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        let (_, payload_b64) = message.split_once('.').ok_or(AuthError::InvalidToken)?;

        let mut mac = Hmac::<Sha256>::new_from_slice(TEST_TOKEN_SECRET)
            .map_err(|_| AuthError::InvalidToken)?;
        mac.update(message.as_bytes());
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;
        if Utc::now().timestamp() > claims.exp {
            return Err(AuthError::ExpiredToken);
        }
        Ok(claims)
    }
}

/// Sender that keeps messages in memory for assertions.
#[derive(Default)]
pub(crate) struct RecordingEmailSender {
    pub(crate) sent: std::sync::Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

fn state_with_notifier(notifier: Option<SubmissionNotifier>) -> Arc<AppState> {
    let store = Arc::new(MemoryRecordStore::new());
    Arc::new(AppState {
        router: FieldRouter::new(store.clone()),
        store,
        blob: Arc::new(MemoryBlobStore::new()),
        verifier: Arc::new(StaticVerifier),
        notifier,
        max_file_size_mb: 5,
        webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
    })
}

pub(crate) fn test_state() -> Arc<AppState> {
    state_with_notifier(None)
}

pub(crate) fn test_state_with_mailbox() -> (Arc<AppState>, Arc<RecordingEmailSender>) {
    let sender = Arc::new(RecordingEmailSender::default());
    let notifier = SubmissionNotifier::new(sender.clone(), "caseworkers@example.com");
    (state_with_notifier(Some(notifier)), sender)
}
