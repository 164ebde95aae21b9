//! Mobile-push destination with multiple sub-destinations.
//!
//! Each configured target is an independent delivery: one target failing
//! or timing out never affects the others, and direct sends report one
//! result per target.

use super::SinkState;
use crate::config::{PushConfig, PushTarget};
use crate::core::{
    DeliveryError, DeliveryResult, Destination, DestinationKind, DirectMessage, Record, Severity,
};
use crate::formatting;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_API_URL: &str = "https://api.pushover.net/1/messages.json";
const DEFAULT_TITLE: &str = "Application Log";

/// A destination that posts each message to every configured push target.
pub struct PushDestination {
    state: SinkState,
    template: String,
    date_format: String,
    targets: Vec<PushTarget>,
    api_url: String,
    client: reqwest::Client,
}

impl PushDestination {
    pub fn new(config: &PushConfig) -> Self {
        Self {
            state: SinkState::new(config.enabled, config.level),
            template: config.format.clone(),
            date_format: config.date_format.clone(),
            targets: config.targets.clone(),
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    async fn post_one(
        &self,
        target: &PushTarget,
        body: &str,
        title: &str,
        priority: Option<i8>,
    ) -> DeliveryResult {
        if target.user_key.is_empty() || target.api_token.is_empty() {
            return Err(DeliveryError::NotConfigured);
        }
        let payload = json!({
            "token": target.api_token,
            "user": target.user_key,
            "message": body,
            "title": title,
            "priority": priority.unwrap_or(target.priority),
        });
        let response = self.client.post(&self.api_url).json(&payload).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(response.status()))
        }
    }

    async fn send_to_all(
        &self,
        body: &str,
        title: &str,
        priority: Option<i8>,
    ) -> Vec<DeliveryResult> {
        join_all(
            self.targets
                .iter()
                .map(|target| self.post_one(target, body, title, priority)),
        )
        .await
    }
}

#[async_trait]
impl Destination for PushDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Push
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

    async fn deliver(&self, record: &Record, rendered: &str) -> DeliveryResult {
        let title = format!("{}: {}", record.severity, record.source);
        let results = self.send_to_all(rendered, &title, None).await;

        let failed: Vec<&str> = self
            .targets
            .iter()
            .zip(&results)
            .filter(|(_, result)| result.is_err())
            .map(|(target, _)| target.name.as_str())
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(DeliveryError::PushTargets(failed.join(", ")))
        }
    }

    async fn direct_send(&self, message: &DirectMessage) -> Vec<DeliveryResult> {
        let title = message.title.as_deref().unwrap_or(DEFAULT_TITLE);
        match &message.target {
            Some(name) => match self.targets.iter().find(|t| &t.name == name) {
                Some(target) => vec![
                    self.post_one(target, &message.body, title, message.priority)
                        .await,
                ],
                None => vec![Err(DeliveryError::UnknownTarget(name.clone()))],
            },
            None => self.send_to_all(&message.body, title, message.priority).await,
        }
    }
}
