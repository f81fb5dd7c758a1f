//! Content generation through an OpenAI-compatible chat completions API.

use super::ContentGenerator;
use crate::error::{LearnerError, LearnerResult};
use crate::progression::guards;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct OpenAiContentGenerator {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiContentGenerator {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn chapter_prompt(title: &str, author: &str, chapter: u32) -> String {
        format!(
            "Summarize chapter {} of the book {} by {}. The summary should be detailed \
             yet readable in under five minutes. No emojis. Use headings only when needed \
             and highlight the key words and phrases. Reply with the summary only.",
            chapter, title, author
        )
    }

    fn pages_prompt(title: &str, author: &str, target_page: u32, current_page: u32) -> String {
        format!(
            "Summarize pages {} to {} of the book {} by {}. The summary should be detailed \
             yet readable in under five minutes. No emojis. Use headings only when needed \
             and highlight the key words and phrases. Reply with the summary only.",
            current_page, target_page, title, author
        )
    }

    fn tip_prompt(topic: &str) -> String {
        format!(
            "Give one detailed tip or trick for working with {}, with a code example when \
             it helps. No emojis. Highlight the key words and phrases. Reply with the tip only.",
            topic
        )
    }

    async fn complete(&self, prompt: String) -> LearnerResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.config.model, "Sending completion request");

        let mut req_builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.config.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| {
                LearnerError::External(format!("Content generation request failed: {}", e))
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LearnerError::External(
                "Content generation is rate limited".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LearnerError::External(format!(
                "Content generation returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            LearnerError::External(format!("Failed to parse completion response: {}", e))
        })?;

        // An empty choice list is reported as empty text, which callers treat as unavailable.
        Ok(chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ContentGenerator for OpenAiContentGenerator {
    async fn summarize_by_chapter(
        &self,
        title: &str,
        author: &str,
        chapter: u32,
    ) -> LearnerResult<String> {
        guards::check_chapter(title, chapter)?;
        self.complete(Self::chapter_prompt(title, author, chapter)).await
    }

    async fn summarize_by_page(
        &self,
        title: &str,
        author: &str,
        target_page: u32,
        current_page: u32,
    ) -> LearnerResult<String> {
        guards::check_page_range(title, target_page, current_page)?;
        self.complete(Self::pages_prompt(title, author, target_page, current_page))
            .await
    }

    async fn tip_for(&self, topic: &str) -> LearnerResult<String> {
        guards::check_topic(topic)?;
        self.complete(Self::tip_prompt(topic)).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
