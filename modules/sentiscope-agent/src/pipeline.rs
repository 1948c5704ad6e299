use std::sync::Arc;
use std::time::Instant;

use ai_client::ChatModel;
use tracing::{info, info_span, warn, Instrument};

use sentiscope_common::{PipelineState, SentimentError, DEFAULT_LANG};

use crate::stages::{AnalysisStage, ContextualizationStage, Stage};

/// Runs the stages in order over a fresh state per call.
///
/// Cheap to clone; concurrent runs share only the model handle.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<Vec<Box<dyn Stage>>>,
}

impl Pipeline {
    /// Contextualization followed by analysis, both on `model`.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(ContextualizationStage::new(model.clone())),
            Box::new(AnalysisStage::new(model)),
        ];
        Self::with_stages(stages)
    }

    pub fn with_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            stages: Arc::new(stages),
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Analyze one text. `lang` defaults to Portuguese.
    ///
    /// The first failing stage aborts the run; no partial state is returned.
    pub async fn run(&self, text: &str, lang: Option<&str>) -> Result<PipelineState, SentimentError> {
        if text.trim().is_empty() {
            return Err(SentimentError::Validation("text must not be blank".into()));
        }
        let lang = lang
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANG);

        let mut state = PipelineState::new(text, lang);

        for stage in self.stages.iter() {
            let started = Instant::now();
            let outcome = stage
                .run(&state)
                .instrument(info_span!("stage", name = stage.name()))
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(update) => {
                    info!(stage = stage.name(), elapsed_ms, "Stage complete");
                    state = state.apply(update);
                }
                Err(e) => {
                    warn!(stage = stage.name(), elapsed_ms, error = %e, "Stage failed");
                    return Err(e);
                }
            }
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[test]
    fn stages_run_in_fixed_order() {
        let pipeline = Pipeline::new(Arc::new(ScriptedModel::new()));
        assert_eq!(pipeline.stage_names(), vec!["contextualization", "analysis"]);
    }

    #[tokio::test]
    async fn blank_text_is_rejected_before_any_call() {
        let model = Arc::new(ScriptedModel::new());
        let pipeline = Pipeline::new(model.clone());

        let err = pipeline.run("   \n", None).await.unwrap_err();
        assert!(matches!(err, SentimentError::Validation(_)));
        assert_eq!(model.call_count(), 0);
    }

    fn assert_send_sync<T: Send + Sync + Clone>() {}

    #[test]
    fn pipeline_is_shareable() {
        assert_send_sync::<Pipeline>();
    }
}
