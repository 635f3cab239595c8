use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("invalid listener: {0}")]
    InvalidListener(String),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("missing secret: {0}")]
    MissingSecret(String),

    #[error("missing value: {0}")]
    MissingValue(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    fn validate(&self, name: &str) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidListener(format!(
                "{name} port must be nonzero"
            )));
        }
        Ok(())
    }
}

/// Which record store backend to talk to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process store, for local development and tests.
    Memory,
    Rest { url: Url },
}

fn default_max_file_size_mb() -> u64 {
    5
}

/// Where submission notification emails go.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub relay_url: Url,
    pub recipient: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub listener: Listener,
    pub admin_listener: Listener,
    pub jwks_url: Url,
    pub store: StoreBackend,
    /// Root directory for uploaded files.
    pub files_dir: PathBuf,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    pub webhook_secret: String,
    /// Submission emails are skipped entirely when unset.
    #[serde(default)]
    pub notification: Option<NotificationConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate("listener")?;
        self.admin_listener.validate("admin_listener")?;
        if self.max_file_size_mb == 0 {
            return Err(ValidationError::InvalidLimit(
                "max_file_size_mb must be nonzero".into(),
            ));
        }
        if self.webhook_secret.is_empty() {
            return Err(ValidationError::MissingSecret("webhook_secret".into()));
        }
        if let Some(notification) = &self.notification
            && notification.recipient.is_empty()
        {
            return Err(ValidationError::MissingValue(
                "notification.recipient".into(),
            ));
        }
        Ok(())
    }
}
