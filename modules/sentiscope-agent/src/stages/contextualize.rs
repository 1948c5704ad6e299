use std::sync::Arc;

use ai_client::{ChatModel, Prompt};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use sentiscope_common::{
    PipelineState, SentimentError, StateUpdate, TraceMessage, CONTEXTUALIZATION_ROLE,
};

use super::Stage;
use crate::parse::parse_json_object;

/// Detects the source language, translates into the target language and
/// strips noise from the text.
pub struct ContextualizationStage {
    model: Arc<dyn ChatModel>,
}

impl ContextualizationStage {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for ContextualizationStage {
    fn name(&self) -> &'static str {
        CONTEXTUALIZATION_ROLE
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate, SentimentError> {
        let prompt = build_contextualization_prompt(&state.text, &state.lang);

        let completion = self
            .model
            .invoke(Prompt::Text(prompt))
            .await
            .map_err(SentimentError::LlmCall)?;

        let reply = parse_json_object(CONTEXTUALIZATION_ROLE, &completion.content)?;
        let original_language = reply.required_str(CONTEXTUALIZATION_ROLE, "original_language")?;
        let clean_text = reply.required_str(CONTEXTUALIZATION_ROLE, "clean_text")?;

        debug!(
            original_language = original_language.as_str(),
            target = state.lang.as_str(),
            clean_len = clean_text.len(),
            "Contextualized text"
        );

        Ok(StateUpdate {
            original_language: Some(original_language),
            clean_text: Some(clean_text),
            analysis: None,
            messages: vec![TraceMessage::new(CONTEXTUALIZATION_ROLE, Value::Object(reply.fields))],
        })
    }
}

pub fn build_contextualization_prompt(text: &str, lang: &str) -> String {
    format!(
        r#"You prepare social media comments for sentiment analysis.

Steps:
1. Detect the language of the text below.
2. Translate it into {lang}, keeping its meaning, tone and emotional intent.
3. Clean up noise such as repeated punctuation, links and spam. Keep emojis; they carry emotion.

Text: """{text}"""

Reply with JSON only, in exactly this shape:
{{
  "original_language": "xx",
  "clean_text": "the normalized, translated text"
}}

Do not add any explanation outside the JSON. The JSON must be syntactically valid."#
    )
}
