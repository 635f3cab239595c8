pub mod auth;
pub mod config;
pub mod email;
pub mod errors;
pub mod fields;
pub mod handlers;
pub mod merge;
pub mod metrics_defs;
pub mod response;
pub mod router;
pub mod service;

#[cfg(test)]
pub(crate) mod testutils;

use std::sync::Arc;

use shared::admin_service::AdminService;
use shared::http::run_http_service;
use tracing::info;

use record_store::{
    BlobStore, FilesystemBlobStore, MemoryRecordStore, RecordStore, RestRecordStore,
};

use crate::auth::JwksVerifier;
use crate::config::{Config, StoreBackend};
use crate::email::{RestEmailSender, SubmissionNotifier};
use crate::errors::ApiError;
use crate::router::FieldRouter;
use crate::service::{AppState, IntakeService};

/// Builds the application state from config and serves the public and
/// admin listeners until either fails.
pub async fn run(config: Config) -> Result<(), ApiError> {
    let store: Arc<dyn RecordStore> = match &config.store {
        StoreBackend::Memory => {
            info!("using in-memory record store");
            Arc::new(MemoryRecordStore::new())
        }
        StoreBackend::Rest { url } => {
            info!(%url, "using REST record store");
            Arc::new(RestRecordStore::new(url.clone()))
        }
    };
    let blob: Arc<dyn BlobStore> = Arc::new(FilesystemBlobStore::new(&config.files_dir));

    let notifier = config.notification.as_ref().map(|notification| {
        info!(recipient = %notification.recipient, "submission notifications enabled");
        SubmissionNotifier::new(
            Arc::new(RestEmailSender::new(notification.relay_url.clone())),
            notification.recipient.clone(),
        )
    });

    let state = Arc::new(AppState {
        router: FieldRouter::new(store.clone()),
        store,
        blob,
        verifier: Arc::new(JwksVerifier::new(config.jwks_url.clone())),
        notifier,
        max_file_size_mb: config.max_file_size_mb,
        webhook_secret: config.webhook_secret.clone(),
    });

    let service = IntakeService::new(state);
    let admin = AdminService::<_, ApiError>::new(|| true);

    tokio::try_join!(
        run_http_service(&config.listener.host, config.listener.port, service),
        run_http_service(
            &config.admin_listener.host,
            config.admin_listener.port,
            admin
        ),
    )?;

    Ok(())
}
