//! The two LLM stages of a pipeline run.
//!
//! A stage reads the current [`PipelineState`] and returns a partial
//! [`StateUpdate`]; it never mutates state itself. Ordering between stages is
//! the orchestrator's job.

mod analyze;
mod contextualize;

pub use analyze::{build_analysis_prompt, AnalysisStage};
pub use contextualize::{build_contextualization_prompt, ContextualizationStage};

use async_trait::async_trait;

use sentiscope_common::{PipelineState, SentimentError, StateUpdate};

#[async_trait]
pub trait Stage: Send + Sync {
    /// Role name written into the trace and used in logs.
    fn name(&self) -> &'static str;

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate, SentimentError>;
}
