use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::Analysis;

/// Trace role written by the contextualization stage.
pub const CONTEXTUALIZATION_ROLE: &str = "contextualization";
/// Trace role written by the analysis stage.
pub const ANALYSIS_ROLE: &str = "analysis";

/// One entry of the per-run trace: which stage produced it and the parsed
/// model reply it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMessage {
    pub role: String,
    pub content: Value,
}

impl TraceMessage {
    pub fn new(role: impl Into<String>, content: Value) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }
}

/// Accumulated state of a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub text: String,
    pub lang: String,
    pub original_language: Option<String>,
    pub clean_text: Option<String>,
    pub analysis: Option<Analysis>,
    pub messages: Vec<TraceMessage>,
}

/// Partial update returned by a stage. `None` fields leave the state alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub original_language: Option<String>,
    pub clean_text: Option<String>,
    pub analysis: Option<Analysis>,
    pub messages: Vec<TraceMessage>,
}

impl PipelineState {
    pub fn new(text: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: lang.into(),
            original_language: None,
            clean_text: None,
            analysis: None,
            messages: Vec::new(),
        }
    }

    /// Fold a stage update into the state.
    ///
    /// `messages` are appended; every other field the update sets replaces the
    /// current value. `text` and `lang` are never touched.
    pub fn apply(self, update: StateUpdate) -> Self {
        let mut messages = self.messages;
        messages.extend(update.messages);

        Self {
            text: self.text,
            lang: self.lang,
            original_language: update.original_language.or(self.original_language),
            clean_text: update.clean_text.or(self.clean_text),
            analysis: update.analysis.or(self.analysis),
            messages,
        }
    }

    /// Roles of the trace entries, in execution order.
    pub fn trace_roles(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.role.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Sentiment;
    use serde_json::json;

    #[test]
    fn apply_appends_messages_and_overwrites_scalars() {
        let state = PipelineState::new("Adorei!!!", "pt");

        let state = state.apply(StateUpdate {
            original_language: Some("pt".into()),
            clean_text: Some("Adorei!".into()),
            messages: vec![TraceMessage::new(CONTEXTUALIZATION_ROLE, json!({"a": 1}))],
            ..Default::default()
        });
        let state = state.apply(StateUpdate {
            analysis: Some(Analysis::new(Sentiment::Positive)),
            messages: vec![TraceMessage::new(ANALYSIS_ROLE, json!({"b": 2}))],
            ..Default::default()
        });

        assert_eq!(state.text, "Adorei!!!");
        assert_eq!(state.lang, "pt");
        assert_eq!(state.original_language.as_deref(), Some("pt"));
        assert_eq!(state.clean_text.as_deref(), Some("Adorei!"));
        assert_eq!(
            state.analysis.map(|a| a.sentiment),
            Some(Sentiment::Positive)
        );
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, CONTEXTUALIZATION_ROLE);
        assert_eq!(state.messages[1].role, ANALYSIS_ROLE);
    }

    #[test]
    fn empty_update_is_identity() {
        let state = PipelineState::new("hi", "en");
        assert_eq!(state.clone().apply(StateUpdate::default()), state);
    }

    #[test]
    fn later_update_wins_for_set_fields() {
        let state = PipelineState::new("hi", "en")
            .apply(StateUpdate {
                clean_text: Some("first".into()),
                ..Default::default()
            })
            .apply(StateUpdate {
                clean_text: Some("second".into()),
                ..Default::default()
            });
        assert_eq!(state.clean_text.as_deref(), Some("second"));
    }
}
