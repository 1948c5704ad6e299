use anyhow::Result;
use reqwest::header::HeaderValue;

use super::types::*;
use crate::http::{json_headers, post_json};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Thin transport for `models/{model}:generateContent`.
pub(crate) struct GeminiClient<'a> {
    api_key: &'a str,
    http: &'a reqwest::Client,
    base_url: &'a str,
}

impl<'a> GeminiClient<'a> {
    pub fn new(api_key: &'a str, http: &'a reqwest::Client, base_url: Option<&'a str>) -> Self {
        Self {
            api_key,
            http,
            base_url: base_url.unwrap_or(GEMINI_API_URL),
        }
    }

    pub async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse> {
        let mut headers = json_headers();
        headers.insert("x-goog-api-key", HeaderValue::from_str(self.api_key)?);

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        post_json(self.http, "Gemini", &url, headers, request).await
    }
}
