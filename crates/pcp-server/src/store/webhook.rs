//! Webhook post-commit hook
//!
//! Notifies an external URL after each committed batch. Delivery is
//! fire-and-forget: the notification runs on a spawned task, failures are
//! logged and never propagate into the ingestion pipeline.

use pcp_common::types::ProductRecord;
use serde_json::json;
use std::time::Duration;

/// Request timeout for webhook deliveries.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Fire-and-forget webhook notifier
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            url: url.into(),
        }
    }

    /// Notify the webhook about a committed batch
    ///
    /// Returns immediately; delivery happens on a background task.
    pub fn notify_batch(&self, owner: &str, records: &[ProductRecord]) {
        let client = self.client.clone();
        let url = self.url.clone();
        let body = json!({
            "operation_type": "bulk_upsert",
            "owner": owner,
            "count": records.len(),
            "skus": records.iter().map(|r| r.sku.as_str()).collect::<Vec<_>>(),
            "emitted_at": chrono::Utc::now().to_rfc3339(),
        });

        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(
                        url = %url,
                        status = %response.status(),
                        "Webhook notification rejected"
                    );
                },
                Ok(_) => {},
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Webhook notification failed");
                },
            }
        });
    }
}
