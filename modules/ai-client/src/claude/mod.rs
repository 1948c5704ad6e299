mod client;
pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::traits::{ChatModel, Completion, MessageRole, Prompt};
use client::ClaudeClient;
use types::*;

pub const DEFAULT_CLAUDE_MODEL: &str = "claude-haiku-4-5-20251001";

// =============================================================================
// Claude
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn client(&self) -> ClaudeClient<'_> {
        ClaudeClient::new(&self.api_key, &self.http, self.base_url.as_deref())
    }

    fn build_request(&self, prompt: Prompt) -> ChatRequest {
        let messages = prompt.into_messages();
        let mut request = ChatRequest::new(&self.model).temperature(0.0);

        if let Some(system) = Prompt::system_text(&messages) {
            request = request.system(system);
        }

        for message in messages {
            request = match message.role {
                MessageRole::System => request,
                MessageRole::User => request.message(WireMessage::user(message.content)),
                MessageRole::Assistant => {
                    request.message(WireMessage::assistant(message.content))
                }
            };
        }

        request
    }
}

#[async_trait]
impl ChatModel for Claude {
    fn name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: Prompt) -> Result<Completion> {
        let request = self.build_request(prompt);
        let response = self.client().chat(&request).await?;

        response
            .text()
            .map(Completion::new)
            .ok_or_else(|| anyhow!("No text response from Claude"))
    }
}
