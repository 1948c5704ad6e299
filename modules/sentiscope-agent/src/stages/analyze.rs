use std::sync::Arc;

use ai_client::{ChatModel, Message, Prompt};
use async_trait::async_trait;
use tracing::debug;

use sentiscope_common::{
    Analysis, Emotion, Impact, Intensity, InteractionType, PipelineState, Sentiment,
    SentimentError, StateUpdate, Tone, TraceMessage, ANALYSIS_ROLE,
};

use super::Stage;
use crate::parse::parse_json_object;

/// Extracts the structured sentiment profile from the cleaned text.
pub struct AnalysisStage {
    model: Arc<dyn ChatModel>,
}

impl AnalysisStage {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for AnalysisStage {
    fn name(&self) -> &'static str {
        ANALYSIS_ROLE
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate, SentimentError> {
        let clean_text = state.clean_text.as_deref().ok_or_else(|| {
            SentimentError::Validation("analysis requires clean_text from contextualization".into())
        })?;

        let prompt = build_analysis_prompt(clean_text, &state.lang);
        let completion = self
            .model
            .invoke(Prompt::Messages(vec![Message::user(prompt)]))
            .await
            .map_err(SentimentError::LlmCall)?;

        let reply = parse_json_object(ANALYSIS_ROLE, &completion.content)?;
        let parsed = reply.to_value();
        let analysis = Analysis::from_llm_value(&parsed)
            .map_err(|reason| reply.malformed(ANALYSIS_ROLE, reason))?;

        debug!(
            sentiment = %analysis.sentiment,
            emotion = ?analysis.emotion,
            entities = analysis.entities.len(),
            "Analyzed text"
        );

        Ok(StateUpdate {
            analysis: Some(analysis),
            messages: vec![TraceMessage::new(ANALYSIS_ROLE, parsed)],
            ..Default::default()
        })
    }
}

pub fn build_analysis_prompt(clean_text: &str, lang: &str) -> String {
    let sentiment = Sentiment::LABELS.join("|");
    let intensity = Intensity::LABELS.join("|");
    let emotion = Emotion::LABELS.join("|");
    let tone = Tone::LABELS.join("|");
    let interaction = InteractionType::LABELS.join("|");
    let impact = Impact::LABELS.join("|");

    format!(
        r##"Analyze the sentiment of the text below.

Text: """{clean_text}"""

Reply with JSON only, using exactly this structure:
{{
  "sentiment": "{sentiment}",
  "intensity": "{intensity}",
  "emotion": "{emotion}",
  "sentiment_value": 0.0 to 1.0 (0 = very negative, 1 = very positive),
  "motivation": "short description of what drives this sentiment",
  "context": {{
    "tone": "{tone}",
    "sarcasm": true or false
  }},
  "entities": ["entities or people mentioned"],
  "hashtags": ["#related_hashtags"],
  "interaction_type": "{interaction}",
  "impact": "{impact}",
  "feedback": "recommendations or observations, if any"
}}

Rules:
- Keys must be exactly the English keys above.
- Enumerated fields must use one of the listed values.
- Write the free-text values (motivation, feedback) in {lang}.
- The JSON must be syntactically valid. Do not add anything outside it."##
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_legal_values_and_language() {
        let prompt = build_analysis_prompt("Adorei o produto", "pt");
        assert!(prompt.contains(r#""sentiment": "positive|negative|neutral""#));
        assert!(prompt.contains(r#""emotion": "joy|anger|sadness|fear|surprise""#));
        assert!(prompt.contains(r#""impact": "low|medium|high""#));
        assert!(prompt.contains("feedback) in pt"));
        assert!(prompt.contains("Adorei o produto"));
    }

    #[test]
    fn prompt_keeps_hashtag_example_intact() {
        let prompt = build_analysis_prompt("ok", "en");
        assert!(prompt.contains(r##""hashtags": ["#related_hashtags"]"##));
        assert!(prompt.trim_end().ends_with("Do not add anything outside it."));
    }
}
