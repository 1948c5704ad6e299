//! Boundary between raw model text and typed values.

use ai_client::sanitize_llm_json;
use serde_json::{Map, Value};
use tracing::warn;

use sentiscope_common::SentimentError;

/// A model reply that parsed as a JSON object, plus the sanitized text it
/// was parsed from.
#[derive(Debug, Clone)]
pub struct ParsedReply {
    pub fields: Map<String, Value>,
    pub sanitized: String,
}

impl ParsedReply {
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// A shape error that carries the sanitized reply, not a re-serialization.
    pub fn malformed(&self, stage: &str, reason: impl Into<String>) -> SentimentError {
        SentimentError::malformed(stage, reason, self.sanitized.clone())
    }

    /// A required string field of the reply.
    pub fn required_str(&self, stage: &str, key: &str) -> Result<String, SentimentError> {
        match self.fields.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.malformed(
                stage,
                format!("`{key}` must be a string, got {}", kind(other)),
            )),
            None => Err(self.malformed(stage, format!("missing `{key}`"))),
        }
    }
}

/// Sanitize a model reply and parse it as a JSON object.
///
/// The sanitized text is carried on every failure so a bad reply can be
/// inspected after the fact.
pub fn parse_json_object(stage: &str, raw: &str) -> Result<ParsedReply, SentimentError> {
    let cleaned = sanitize_llm_json(raw);

    let value: Value = serde_json::from_str(&cleaned).map_err(|e| {
        warn!(stage, error = %e, "Model reply is not valid JSON");
        SentimentError::malformed(stage, format!("invalid JSON: {e}"), cleaned.clone())
    })?;

    match value {
        Value::Object(fields) => Ok(ParsedReply {
            fields,
            sanitized: cleaned,
        }),
        other => Err(SentimentError::malformed(
            stage,
            format!("expected a JSON object, got {}", kind(&other)),
            cleaned,
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_object() {
        let reply = parse_json_object("analysis", "```json\n{\"sentiment\":\"positive\"}\n```").unwrap();
        assert_eq!(reply.fields["sentiment"], "positive");
        assert_eq!(reply.sanitized, "{\"sentiment\":\"positive\"}");
    }

    #[test]
    fn non_json_keeps_sanitized_text() {
        let err = parse_json_object("contextualization", "```json\nnot json\n```").unwrap_err();
        match err {
            SentimentError::MalformedOutput { stage, raw, .. } => {
                assert_eq!(stage, "contextualization");
                assert_eq!(raw, "not json");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn arrays_are_rejected() {
        let err = parse_json_object("analysis", "[1, 2]").unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn quoted_object_is_not_unescaped() {
        // One quote layer is stripped, but escaped inner quotes stay escaped.
        let err = parse_json_object("analysis", r#""{\"a\":1}""#).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn required_str_rejects_wrong_types() {
        let reply = parse_json_object("contextualization", r#"{"clean_text": 5}"#).unwrap();
        assert!(reply.required_str("contextualization", "clean_text").is_err());
        assert!(reply.required_str("contextualization", "original_language").is_err());
    }

    #[test]
    fn shape_errors_carry_the_sanitized_reply() {
        let raw = "```json\n{\"zeta\": 1, \"clean_text\": null}\n```";
        let reply = parse_json_object("contextualization", raw).unwrap();

        match reply.required_str("contextualization", "clean_text").unwrap_err() {
            SentimentError::MalformedOutput { raw, reason, .. } => {
                assert_eq!(raw, "{\"zeta\": 1, \"clean_text\": null}");
                assert!(reason.contains("null"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
