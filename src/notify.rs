//! Webhook notifications for finalized distributions
//!
//! Payloads use the Discord embed shape (`title`, `fields`, `color`,
//! `timestamp`). Delivery is best-effort: every configured URL is attempted and
//! failures are reported back to the audit recorder, which only logs them.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::audit::PostCommitHook;
use crate::types::{DistributionOutcome, DistributionRecord, RecordStatus};

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Critical,
}

impl Severity {
    pub fn color(&self) -> u32 {
        match self {
            Severity::Info => 0x3498DB,
            Severity::Success => 0x2ECC71,
            Severity::Critical => 0xE74C3C,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{failed} of {total} webhook deliveries failed")]
    Delivery { failed: usize, total: usize },
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Field {
    fn inline(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline: true,
        }
    }

    fn block(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline: false,
        }
    }
}

pub struct WebhookNotifier {
    client: Client,
    urls: Vec<String>,
}

impl WebhookNotifier {
    pub fn new(urls: Vec<String>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(NotifyError::Client)?;
        Ok(Self { client, urls })
    }

    pub fn url_count(&self) -> usize {
        self.urls.len()
    }

    /// Post one embed to every URL. Returns an error if any delivery failed.
    pub async fn send(
        &self,
        severity: Severity,
        title: &str,
        fields: &[Field],
    ) -> Result<(), NotifyError> {
        let payload = embed_payload(severity, title, fields);
        let mut failed = 0;

        for url in &self.urls {
            let outcome = self
                .client
                .post(url)
                .json(&payload)
                .send()
                .await
                .and_then(|resp| resp.error_for_status());

            match outcome {
                Ok(_) => debug!(title, "Webhook delivered"),
                Err(e) => {
                    failed += 1;
                    warn!(title, error = %e, "Webhook delivery failed");
                }
            }
        }

        if failed > 0 {
            return Err(NotifyError::Delivery {
                failed,
                total: self.urls.len(),
            });
        }
        Ok(())
    }
}

fn embed_payload(severity: Severity, title: &str, fields: &[Field]) -> Value {
    let fields: Vec<Value> = fields
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "value": f.value,
                "inline": f.inline,
            })
        })
        .collect();

    json!({
        "embeds": [{
            "title": title,
            "color": severity.color(),
            "fields": fields,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }]
    })
}

/// Title, severity and fields describing a finalized record
pub fn describe(record: &DistributionRecord) -> (Severity, &'static str, Vec<Field>) {
    let mut fields = vec![
        Field::inline("Amount", format!("{} SOL", record.amount)),
        Field::inline("Record", record.id.to_string()),
    ];

    let (severity, title) = match (record.status, record.result) {
        (RecordStatus::Completed, DistributionOutcome::Holder) => {
            if let Some(recipient) = &record.recipient {
                fields.push(Field::block("Recipient", recipient.clone()));
            }
            if let Some(tx) = &record.tx_hash {
                fields.push(Field::block("Transaction", tx.clone()));
            }
            (Severity::Success, "Holder Reward Sent")
        }
        (RecordStatus::Completed, DistributionOutcome::Burn) => {
            fields.push(Field::block("Action", "Manual burn required"));
            (Severity::Info, "Burn Outcome Recorded")
        }
        _ => {
            fields.push(Field::block(
                "Error",
                record.error_message.as_deref().unwrap_or("unknown error"),
            ));
            (Severity::Critical, "Distribution Failed")
        }
    };

    (severity, title, fields)
}

#[async_trait]
impl PostCommitHook for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn on_finalized(&self, record: &DistributionRecord) -> anyhow::Result<()> {
        let (severity, title, fields) = describe(record);
        self.send(severity, title, &fields).await?;
        Ok(())
    }
}
