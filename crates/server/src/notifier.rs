use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use opsdesk_core::config::NotificationsConfig;
use opsdesk_core::notify::{LogNotifier, NotificationEvent, Notifier, NotifyError};

/// Wire shape posted to the webhook.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    request_id: &'a str,
    request_number: &'a str,
    kind: &'static str,
    actor_id: &'a str,
    status: &'static str,
    occurred_at: String,
}

impl<'a> From<&'a NotificationEvent> for WebhookPayload<'a> {
    fn from(event: &'a NotificationEvent) -> Self {
        Self {
            request_id: &event.request_id.0,
            request_number: &event.request_number,
            kind: event.kind.as_str(),
            actor_id: &event.actor_id.0,
            status: event.status.as_str(),
            occurred_at: event.occurred_at.to_rfc3339(),
        }
    }
}

/// Posts each event to an HTTP endpoint on a detached task. Delivery
/// failures are logged and dropped.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    token: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| NotifyError::Transport(error.to_string()))?;
        Ok(Self { client, url: url.into(), token })
    }
}

impl Notifier for WebhookNotifier {
    fn emit(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        let handle = Handle::try_current().map_err(|_| {
            NotifyError::Transport("no async runtime to deliver webhook".to_string())
        })?;
        let body = serde_json::to_value(WebhookPayload::from(&event))
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let request_id = event.request_id.0.clone();
        handle.spawn(async move {
            match request.send().await.and_then(|response| response.error_for_status()) {
                Ok(response) => debug!(
                    event_name = "notify.webhook.delivered",
                    request_id = %request_id,
                    status = response.status().as_u16(),
                    "webhook delivered"
                ),
                Err(error) => warn!(
                    event_name = "notify.webhook.failed",
                    request_id = %request_id,
                    error = %error,
                    "webhook delivery failed"
                ),
            }
        });
        Ok(())
    }
}

/// Webhook when a URL is configured, structured logs otherwise.
pub fn from_config(config: &NotificationsConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            config.webhook_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
