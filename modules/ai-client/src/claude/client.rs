use anyhow::Result;
use reqwest::header::HeaderValue;

use super::types::*;
use crate::http::{json_headers, post_json};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Thin transport for the Messages API.
pub(crate) struct ClaudeClient<'a> {
    api_key: &'a str,
    http: &'a reqwest::Client,
    base_url: &'a str,
}

impl<'a> ClaudeClient<'a> {
    pub fn new(api_key: &'a str, http: &'a reqwest::Client, base_url: Option<&'a str>) -> Self {
        Self {
            api_key,
            http,
            base_url: base_url.unwrap_or(ANTHROPIC_API_URL),
        }
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut headers = json_headers();
        headers.insert("x-api-key", HeaderValue::from_str(self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        post_json(self.http, "Claude", &url, headers, request).await
    }
}
