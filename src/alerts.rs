use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::amount::Amount;

#[async_trait]
pub trait SendAlert: Send + Sync {
    async fn send_alert(&self, message: &str) -> Result<()>;
}

pub fn alert_message(balance: &Amount, threshold: &Amount) -> String {
    format!(
        "USDC balance {} >= threshold {}",
        balance.fixed(),
        threshold.fixed()
    )
}

/// Delivers alerts as a GET to a webhook with the text in the `message` query parameter.
#[derive(Clone)]
pub struct WebhookAlerts {
    client: reqwest::Client,
    base_url: Url,
}

impl WebhookAlerts {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn message_url(&self, message: &str) -> Url {
        let mut url = self.base_url.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "message")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("message", message);
        url
    }
}

#[async_trait]
impl SendAlert for WebhookAlerts {
    async fn send_alert(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .get(self.message_url(message))
            .send()
            .await
            .context("send alert request")?;

        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(anyhow!("alert request failed with HTTP {}", status.as_u16()));
        }

        debug!(message, "sent webhook alert");
        Ok(())
    }
}
