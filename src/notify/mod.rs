use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{with_retry, ConclaveError, RetryConfig};
use crate::orchestrator::{EventBus, OrchestratorEvent, SubscriptionId};

/// Fire-and-forget webhook delivery of orchestrator events.
///
/// Attached to an [`EventBus`] subscription and drained on its own task,
/// so a slow or dead endpoint never back-pressures the orchestrator.
/// Delivery failures are retried per the classified policy, then logged
/// and dropped; they are never propagated.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            retry: RetryConfig { max_retries: 2, dry_run: false },
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Subscribe to `bus` and deliver every event in the background.
    /// Returns the subscription id so the caller can detach later.
    pub fn attach(self: Arc<Self>, bus: &EventBus) -> SubscriptionId {
        let (id, mut rx) = bus.subscribe();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.deliver(&event).await;
            }
            debug!("Webhook notifier detached");
        });
        id
    }

    pub async fn deliver(&self, event: &OrchestratorEvent) {
        let result = with_retry("webhook-delivery", &self.retry, || async {
            let response = self
                .client
                .post(&self.url)
                .json(event)
                .send()
                .await
                .map_err(|e| ConclaveError::Network(e.to_string()))?;
            response
                .error_for_status()
                .map_err(|e| ConclaveError::Network(e.to_string()))?;
            Ok(())
        })
        .await;

        if let Err(e) = result {
            warn!(url = %self.url, error = %e, "Webhook delivery failed, dropping event");
        }
    }
}
