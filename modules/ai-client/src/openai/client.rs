use anyhow::Result;
use reqwest::header::{HeaderValue, AUTHORIZATION};

use super::types::*;
use crate::http::{json_headers, post_json};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Thin transport for chat completions.
pub(crate) struct OpenAiClient<'a> {
    api_key: &'a str,
    http: &'a reqwest::Client,
    base_url: &'a str,
}

impl<'a> OpenAiClient<'a> {
    pub fn new(api_key: &'a str, http: &'a reqwest::Client, base_url: Option<&'a str>) -> Self {
        Self {
            api_key,
            http,
            base_url: base_url.unwrap_or(OPENAI_API_URL),
        }
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut headers = json_headers();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        post_json(self.http, "OpenAI", &url, headers, request).await
    }
}
