mod client;
pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::traits::{ChatModel, Completion, MessageRole, Prompt};
use client::GeminiClient;
use types::*;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

// =============================================================================
// Gemini
// =============================================================================

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| anyhow!("GOOGLE_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn client(&self) -> GeminiClient<'_> {
        GeminiClient::new(&self.api_key, &self.http, self.base_url.as_deref())
    }

    fn build_request(&self, prompt: Prompt) -> GenerateRequest {
        let messages = prompt.into_messages();
        let system_instruction =
            Prompt::system_text(&messages).map(|text| Content::text(None, text));

        let contents = messages
            .into_iter()
            .filter_map(|m| match m.role {
                MessageRole::System => None,
                MessageRole::User => Some(Content::text(Some("user"), m.content)),
                MessageRole::Assistant => Some(Content::text(Some("model"), m.content)),
            })
            .collect();

        GenerateRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 4096,
            },
        }
    }
}

#[async_trait]
impl ChatModel for Gemini {
    fn name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: Prompt) -> Result<Completion> {
        let request = self.build_request(prompt);
        let response = self.client().generate(&self.model, &request).await?;

        match response.text() {
            Some(text) => Ok(Completion::new(text)),
            None => Err(anyhow!(
                "No text in Gemini response (feedback: {})",
                response
                    .prompt_feedback
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "none".to_string())
            )),
        }
    }
}
