//! Outbound announcements for newly detected entries.
//!
//! Delivery is best-effort: the poll cycle logs a failed notification and
//! carries on, and the entry stays recorded as seen either way.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::util::{clean_title, truncate_chars};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord rejects message content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;

/// Response bodies are only kept for the error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Webhook request timed out")]
    Timeout,
    #[error("Webhook error {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

/// Delivers "new entry" announcements somewhere.
pub trait Notifier {
    fn notify(
        &self,
        title: &str,
        link: &str,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

#[derive(Serialize)]
struct WebhookPayload {
    content: String,
}

/// Posts announcements to a Discord channel webhook.
///
/// The webhook URL is a bearer credential, so it is held as a [`SecretString`]
/// and never appears in logs or error messages.
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: SecretString,
    timeout: Duration,
}

impl DiscordNotifier {
    pub fn new(client: reqwest::Client, webhook_url: SecretString) -> Self {
        Self {
            client,
            webhook_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Notifier for the configured webhook, bounded by the configured request
    /// timeout. `None` when no webhook is set.
    pub fn from_config(client: reqwest::Client, config: &Config) -> Option<Self> {
        let url = config.discord_webhook_url.clone()?;
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        Some(Self::new(client, SecretString::from(url)).with_timeout(timeout))
    }
}

impl std::fmt::Debug for DiscordNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordNotifier")
            .field("webhook_url", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Message text for one entry, kept under Discord's content limit by
/// shortening the title. The link is never cut.
fn format_message(title: &str, link: &str) -> String {
    let prefix = "**New video:** ";
    let fixed = prefix.chars().count() + 1 + link.chars().count();
    let budget = MAX_CONTENT_CHARS.saturating_sub(fixed);
    let title = clean_title(title);
    format!("{}{}\n{}", prefix, truncate_chars(&title, budget), link)
}

impl Notifier for DiscordNotifier {
    async fn notify(&self, title: &str, link: &str) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            content: format_message(title, link),
        };

        let request = self
            .client
            .post(self.webhook_url.expose_secret())
            .json(&payload)
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| NotifyError::Timeout)?
            // Strip the URL so the webhook token can't leak through the error.
            .map_err(|e| NotifyError::Network(e.without_url()))?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::HttpStatus {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS).into_owned(),
            });
        }

        Ok(())
    }
}
