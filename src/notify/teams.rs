//! Teams channel — posts digest Adaptive Cards to an incoming webhook.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::NotifyError;
use crate::model::NotificationItem;
use crate::notify::Notifier;
use crate::notify::card::{self, CardEnvelope, PAYLOAD_LIMIT_BYTES};

/// Timeout for a single webhook POST.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Teams notifier — fits the digest to the webhook payload limit and
/// delivers it as a single Adaptive Card message.
pub struct TeamsNotifier {
    webhook_url: String,
    limit_bytes: usize,
    client: reqwest::Client,
}

impl TeamsNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self::with_limit(webhook_url, PAYLOAD_LIMIT_BYTES)
    }

    /// Construct with a custom payload limit.
    pub fn with_limit(webhook_url: String, limit_bytes: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            webhook_url,
            limit_bytes,
            client,
        }
    }

    /// POST an envelope to the webhook. The body is the same serde_json
    /// encoding the sizer measured.
    async fn post_envelope(&self, envelope: &CardEnvelope) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                channel: "teams".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(NotifyError::Status {
                channel: "teams".into(),
                status: resp.status(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TeamsNotifier {
    fn name(&self) -> &str {
        "teams"
    }

    async fn send_digest(&self, items: &[NotificationItem], topics: &[String]) -> bool {
        if items.is_empty() {
            tracing::info!("No relevant papers to send to Teams");
            return true;
        }

        // One clock read per dispatch: every probe and the final render
        // share the timestamp.
        let generated_at = Utc::now();

        let fitting = card::find_max_fitting_count(items, topics, self.limit_bytes, generated_at);
        if fitting < items.len() {
            tracing::warn!(
                shown = fitting,
                total = items.len(),
                limit_bytes = self.limit_bytes,
                "Digest truncated to fit Teams payload limit"
            );
        }

        let envelope = card::render(&items[..fitting], topics, items.len(), generated_at);

        match self.post_envelope(&envelope).await {
            Ok(()) => {
                tracing::info!(papers = fitting, "Teams notification sent");
                true
            }
            Err(e) => {
                tracing::error!("Failed to send Teams notification: {e}");
                false
            }
        }
    }

    async fn send_error(&self, message: &str) -> bool {
        let envelope = card::render_error(message, Utc::now());
        match self.post_envelope(&envelope).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to send Teams error notification: {e}");
                false
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
