//! Chat-bot destination: HTTP POST to a bot messaging API.

use super::SinkState;
use crate::config::ChatConfig;
use crate::core::{
    DeliveryError, DeliveryResult, Destination, DestinationKind, DirectMessage, Record, Severity,
};
use crate::formatting;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A destination that posts each message to a bot API endpoint.
///
/// The endpoint is derived from the bot token unless the configuration
/// supplies an explicit `api_url` (self-hosted gateways, tests).
pub struct ChatDestination {
    state: SinkState,
    template: String,
    date_format: String,
    chat_id: String,
    parse_mode: String,
    endpoint: String,
    configured: bool,
    client: reqwest::Client,
}

impl ChatDestination {
    pub fn new(config: &ChatConfig) -> Self {
        let endpoint = config.api_url.clone().unwrap_or_else(|| {
            format!(
                "https://api.telegram.org/bot{}/sendMessage",
                config.bot_token
            )
        });
        Self {
            state: SinkState::new(config.enabled, config.level),
            template: config.format.clone(),
            date_format: config.date_format.clone(),
            chat_id: config.chat_id.clone(),
            parse_mode: config.parse_mode.clone(),
            endpoint,
            configured: !config.bot_token.is_empty() && !config.chat_id.is_empty(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    async fn post_message(&self, text: &str, parse_mode: Option<&str>) -> DeliveryResult {
        if !self.configured {
            return Err(DeliveryError::NotConfigured);
        }
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": parse_mode.unwrap_or(&self.parse_mode),
        });
        let response = self.client.post(&self.endpoint).json(&payload).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(response.status()))
        }
    }
}

#[async_trait]
impl Destination for ChatDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Chat
    }

    fn is_enabled(&self) -> bool {
        self.state.enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    fn threshold(&self) -> Severity {
        self.state.threshold()
    }

    fn set_threshold(&self, threshold: Severity) {
        self.state.set_threshold(threshold);
    }

    fn format(&self, record: &Record) -> String {
        formatting::render(&self.template, &self.date_format, record)
    }

    async fn deliver(&self, _record: &Record, rendered: &str) -> DeliveryResult {
        self.post_message(rendered, None).await
    }

    async fn direct_send(&self, message: &DirectMessage) -> Vec<DeliveryResult> {
        vec![
            self.post_message(&message.body, message.parse_mode.as_deref())
                .await,
        ]
    }
}
