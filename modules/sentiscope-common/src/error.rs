use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("LLM call failed: {0:#}")]
    LlmCall(anyhow::Error),

    #[error("Malformed LLM output in {stage} stage: {reason}")]
    MalformedOutput {
        stage: String,
        reason: String,
        /// Sanitized model reply, kept for diagnostics.
        raw: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Reprocessing already in progress for user {0}")]
    BatchInProgress(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SentimentError {
    pub fn malformed(
        stage: impl Into<String>,
        reason: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self::MalformedOutput {
            stage: stage.into(),
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedOutput { .. })
    }
}

pub type Result<T> = std::result::Result<T, SentimentError>;
