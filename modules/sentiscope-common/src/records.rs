use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::Analysis;

/// Account that owns social posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// A persisted comment with no sentiment row yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingComment {
    pub id: String,
    pub post_id: String,
    pub text: Option<String>,
    pub username: Option<String>,
}

impl PendingComment {
    /// Comment text with surrounding whitespace removed, or `None` when blank.
    pub fn analyzable_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Flat, storable projection of an [`Analysis`] for one comment.
///
/// Enum fields are stored as their lowercase labels (`"unknown"` included);
/// `entities` and `hashtags` become child rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub id: Uuid,
    pub comment_id: String,
    pub sentiment: String,
    pub intensity: Option<String>,
    pub emotion: Option<String>,
    pub sentiment_value: Option<f64>,
    pub motivation: Option<String>,
    pub tone: Option<String>,
    pub sarcasm: Option<bool>,
    pub interaction_type: Option<String>,
    pub impact: Option<String>,
    pub feedback: Option<String>,
    pub entities: Vec<String>,
    pub hashtags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl SentimentRecord {
    pub fn from_analysis(comment_id: impl Into<String>, analysis: &Analysis) -> Self {
        Self {
            id: Uuid::new_v4(),
            comment_id: comment_id.into(),
            sentiment: analysis.sentiment.as_str().to_string(),
            intensity: analysis.intensity.map(|v| v.as_str().to_string()),
            emotion: analysis.emotion.map(|v| v.as_str().to_string()),
            sentiment_value: analysis.sentiment_value,
            motivation: analysis.motivation.clone(),
            tone: analysis.context.tone.map(|v| v.as_str().to_string()),
            sarcasm: analysis.context.sarcasm,
            interaction_type: analysis.interaction_type.map(|v| v.as_str().to_string()),
            impact: analysis.impact.map(|v| v.as_str().to_string()),
            feedback: analysis.feedback.clone(),
            entities: analysis.entities.clone(),
            hashtags: analysis.hashtags.clone(),
            created_at: Utc::now(),
        }
    }
}

/// One comment the batch loop analyzed and persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedComment {
    pub comment_id: String,
    pub analysis: Analysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedComment {
    pub comment_id: String,
    pub error: String,
}

/// Outcome of a batch reprocessing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<AnalyzedComment>,
    /// Comments with blank text, or that already had a sentiment by save time.
    pub skipped: Vec<String>,
    pub failed: Vec<FailedComment>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Emotion, Sentiment, Tone};

    #[test]
    fn projection_flattens_enums_to_labels() {
        let mut analysis = Analysis::new(Sentiment::Negative);
        analysis.emotion = Some(Emotion::Unknown);
        analysis.context.tone = Some(Tone::Formal);
        analysis.context.sarcasm = Some(true);
        analysis.entities = vec!["Ana".into()];
        analysis.hashtags = vec!["#ruim".into(), "#nunca".into()];

        let record = SentimentRecord::from_analysis("c-1", &analysis);

        assert_eq!(record.comment_id, "c-1");
        assert_eq!(record.sentiment, "negative");
        assert_eq!(record.emotion.as_deref(), Some("unknown"));
        assert_eq!(record.tone.as_deref(), Some("formal"));
        assert_eq!(record.sarcasm, Some(true));
        assert_eq!(record.intensity, None);
        assert_eq!(record.entities.len(), 1);
        assert_eq!(record.hashtags.len(), 2);
    }

    #[test]
    fn blank_comment_text_is_not_analyzable() {
        let mut comment = PendingComment {
            id: "c".into(),
            post_id: "p".into(),
            text: Some("   ".into()),
            username: None,
        };
        assert_eq!(comment.analyzable_text(), None);

        comment.text = None;
        assert_eq!(comment.analyzable_text(), None);

        comment.text = Some(" ok ".into());
        assert_eq!(comment.analyzable_text(), Some("ok"));
    }
}
