//! Outbound submission notifications.
//!
//! When an application is submitted, caseworkers get an email with the
//! record flattened into a CSV attachment. Delivery goes through a mail
//! relay behind a trait so tests can capture messages in process.

use async_trait::async_trait;
use record_store::{FieldValue, Record};
use serde::Serialize;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum EmailError {
    #[error("mail relay unavailable: {0}")]
    Unavailable(String),

    #[error("mail relay rejected the message: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// CSV attachment content, when the message carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

/// Sender that posts messages to an HTTP mail relay.
pub struct RestEmailSender {
    client: reqwest::Client,
    relay_url: Url,
}

impl RestEmailSender {
    pub fn new(relay_url: Url) -> Self {
        RestEmailSender {
            client: reqwest::Client::new(),
            relay_url,
        }
    }
}

#[async_trait]
impl EmailSender for RestEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let response = self
            .client
            .post(self.relay_url.clone())
            .json(&message)
            .send()
            .await
            .map_err(|e| EmailError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmailError::Rejected(format!(
                "status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn csv_quote(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}

fn value_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => csv_quote(s),
        other => csv_quote(&other.to_string()),
    }
}

/// Flattens a record into CSV rows of `"field","value"`. List entries get
/// one indented row each; documents are listed by name and type.
pub fn build_submission_csv(record: &Record) -> String {
    let mut csv = String::new();
    csv.push_str(&format!(
        "{},{}\n",
        csv_quote("application_id"),
        csv_quote(&record.application_id)
    ));

    for (field, value) in &record.fields {
        match value {
            FieldValue::One(detail) => {
                let raw = serde_json::to_value(&detail.value).unwrap_or_default();
                csv.push_str(&format!("{},{}\n", csv_quote(field), value_cell(&raw)));
            }
            FieldValue::Many(details) => {
                csv.push_str(&format!("{}\n", csv_quote(field)));
                for detail in details {
                    let raw = serde_json::to_value(&detail.value).unwrap_or_default();
                    csv.push_str(&format!(",{}\n", value_cell(&raw)));
                }
            }
            FieldValue::Documents(documents) => {
                csv.push_str(&format!("{}\n", csv_quote(field)));
                for doc in documents {
                    csv.push_str(&format!(
                        ",{},{}\n",
                        csv_quote(&doc.document_name),
                        csv_quote(&doc.document_type)
                    ));
                }
            }
            FieldValue::Raw(raw) => {
                let raw = serde_json::to_value(raw).unwrap_or_default();
                csv.push_str(&format!("{},{}\n", csv_quote(field), value_cell(&raw)));
            }
        }
    }

    csv
}

/// Bundles the sender with its configured recipient.
pub struct SubmissionNotifier {
    sender: std::sync::Arc<dyn EmailSender>,
    recipient: String,
}

impl SubmissionNotifier {
    pub fn new(sender: std::sync::Arc<dyn EmailSender>, recipient: impl Into<String>) -> Self {
        SubmissionNotifier {
            sender,
            recipient: recipient.into(),
        }
    }

    pub async fn notify_submitted(&self, record: &Record) -> Result<(), EmailError> {
        let message = EmailMessage {
            to: self.recipient.clone(),
            subject: format!("Application {} submitted", record.application_id),
            body: format!(
                "Application {} for {} has been submitted and paid.",
                record.application_id, record.email
            ),
            attachment: Some(build_submission_csv(record)),
        };
        self.sender.send(message).await
    }
}
