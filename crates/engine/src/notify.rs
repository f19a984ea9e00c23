//! Webhook delivery for CRITICAL alerts.
//!
//! POSTs the alert as JSON with `ureq` on a blocking task, the same way the
//! HTTP replica talks to its endpoint.

use async_trait::async_trait;
use safekeep_core::{Alert, Notifier, NotifyError};

pub struct WebhookNotifier {
    url: String,
    agent: ureq::Agent,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        WebhookNotifier {
            url: url.to_string(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let agent = self.agent.clone();
        let url = self.url.clone();
        let alert = alert.clone();
        tokio::task::spawn_blocking(move || {
            agent
                .post(&url)
                .send_json(&alert)
                .map(|_| ())
                .map_err(|e| NotifyError(format!("webhook {url}: {e}")))
        })
        .await
        .map_err(|e| NotifyError(format!("task join error: {e}")))?
    }
}
