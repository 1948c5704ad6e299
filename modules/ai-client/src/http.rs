use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::util::truncate_to_char_boundary;

/// Error bodies are clipped to this many bytes before they reach logs.
const MAX_ERROR_BODY: usize = 500;

pub(crate) fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// POST `body` as JSON and decode the JSON reply.
///
/// Non-2xx statuses become errors carrying the status and a clipped body.
pub(crate) async fn post_json<B, R>(
    http: &reqwest::Client,
    provider: &str,
    url: &str,
    headers: HeaderMap,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let started = std::time::Instant::now();
    let response = http
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .with_context(|| format!("{provider} request failed"))?;

    let status = response.status();
    let text = response.text().await?;
    debug!(
        provider,
        status = status.as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        bytes = text.len(),
        "LLM response"
    );

    if !status.is_success() {
        return Err(anyhow!(
            "{provider} API error ({status}): {}",
            truncate_to_char_boundary(&text, MAX_ERROR_BODY)
        ));
    }

    serde_json::from_str(&text).with_context(|| {
        format!(
            "{provider} returned an unexpected body: {}",
            truncate_to_char_boundary(&text, MAX_ERROR_BODY)
        )
    })
}
