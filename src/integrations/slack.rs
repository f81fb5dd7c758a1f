//! Slack Web API client: message delivery and channel lookup/creation.

use super::{ChannelDirectory, DeliveryChannel};
use crate::error::{LearnerError, LearnerResult};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

/// Slack rejects channel names longer than this.
const MAX_CHANNEL_NAME_LENGTH: usize = 80;

lazy_static! {
    static ref BOLD: Regex = Regex::new(r"\*\*(.+?)\*\*").unwrap();
    static ref UNDERSCORE_BOLD: Regex = Regex::new(r"__(.+?)__").unwrap();
    static ref HEADING: Regex = Regex::new(r"(?m)^#{1,6}\s+\*?(.+?)\*?\s*$").unwrap();
    static ref STRIKE: Regex = Regex::new(r"~~(.+?)~~").unwrap();
    static ref LINK: Regex = Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap();
    static ref BULLET: Regex = Regex::new(r"(?m)^(\s*)[-*+]\s+").unwrap();
}

/// Converts common Markdown into Slack's mrkdwn dialect.
pub fn to_slack_markdown(message: &str) -> String {
    let message = BOLD.replace_all(message, "*$1*");
    let message = UNDERSCORE_BOLD.replace_all(&message, "*$1*");
    let message = HEADING.replace_all(&message, "*$1*");
    let message = STRIKE.replace_all(&message, "~$1~");
    let message = LINK.replace_all(&message, "<$2|$1>");
    BULLET.replace_all(&message, "${1}• ").into_owned()
}

/// Channel name derived from a subject name: lowercase, spaces become hyphens,
/// apostrophes are dropped.
pub fn sanitize_channel_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '’')
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .take(MAX_CHANNEL_NAME_LENGTH)
        .collect()
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub api_url: String,
    pub bot_token: String,
    pub timeout: Duration,
}

pub struct SlackClient {
    client: Client,
    config: SlackConfig,
}

/// Every Web API response carries `ok`, and `error` when `ok` is false.
#[derive(Debug, Deserialize)]
struct SlackEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationsList {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct ConversationsCreate {
    channel: SlackChannel,
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    id: String,
    name: String,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Checks `ok`, then decodes the method specific payload.
    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> LearnerResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(LearnerError::External(format!(
                "Slack {} returned HTTP {}",
                method,
                status.as_u16()
            )));
        }
        let body: serde_json::Value = response.json().await.map_err(|e| {
            LearnerError::External(format!("Failed to parse Slack {} response: {}", method, e))
        })?;
        let envelope: SlackEnvelope = serde_json::from_value(body.clone())?;
        if !envelope.ok {
            let error = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(LearnerError::External(format!("Slack {} failed: {}", method, error)));
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> LearnerResult<T> {
        let response = self
            .client
            .post(format!("{}/{}", self.config.api_url, method))
            .bearer_auth(&self.config.bot_token)
            .timeout(self.config.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                LearnerError::External(format!("Slack {} request failed: {}", method, e))
            })?;
        Self::decode(method, response).await
    }

    async fn find_channel(&self, name: &str) -> LearnerResult<Option<String>> {
        let mut cursor = String::new();
        loop {
            let mut query = vec![("types", "public_channel"), ("limit", "1000")];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }
            let response = self
                .client
                .get(format!("{}/conversations.list", self.config.api_url))
                .bearer_auth(&self.config.bot_token)
                .timeout(self.config.timeout)
                .query(&query)
                .send()
                .await
                .map_err(|e| {
                    LearnerError::External(format!("Slack conversations.list failed: {}", e))
                })?;
            let page: ConversationsList = Self::decode("conversations.list", response).await?;

            if let Some(channel) = page.channels.into_iter().find(|c| c.name == name) {
                return Ok(Some(channel.id));
            }
            match page.response_metadata {
                Some(meta) if !meta.next_cursor.is_empty() => cursor = meta.next_cursor,
                _ => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl DeliveryChannel for SlackClient {
    async fn deliver(&self, channel_id: &str, text: &str) -> LearnerResult<()> {
        if channel_id.is_empty() || text.is_empty() {
            return Err(LearnerError::invalid("message needs a channel and a text"));
        }
        let payload = json!({
            "channel": channel_id,
            "text": to_slack_markdown(text),
        });
        self.post::<SlackEnvelope>("chat.postMessage", payload)
            .await
            .map_err(|e| match e {
                LearnerError::External(msg) => LearnerError::DeliveryFailed(msg),
                other => other,
            })?;
        debug!("Delivered {} chars to {}", text.len(), channel_id);
        Ok(())
    }
}

#[async_trait]
impl ChannelDirectory for SlackClient {
    async fn resolve_or_create_channel(&self, name: &str) -> LearnerResult<String> {
        let sanitized = sanitize_channel_name(name);
        if sanitized.is_empty() {
            return Err(LearnerError::invalid("empty channel name given"));
        }

        if let Some(id) = self.find_channel(&sanitized).await? {
            return Ok(id);
        }

        let created: ConversationsCreate = self
            .post("conversations.create", json!({ "name": sanitized }))
            .await?;
        info!("Created channel #{} ({})", created.channel.name, created.channel.id);
        Ok(created.channel.id)
    }
}
