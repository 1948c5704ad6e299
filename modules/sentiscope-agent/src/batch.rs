use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use sentiscope_common::{
    AnalyzedComment, BatchReport, FailedComment, PendingComment, SentimentError, SentimentRecord,
};

use crate::pipeline::Pipeline;
use crate::traits::CommentStore;

#[derive(Debug, Clone, Copy, Default, TypedBuilder)]
pub struct BatchOptions {
    /// Stop at the first failed comment instead of recording it and moving on.
    #[builder(default)]
    pub stop_on_error: bool,
}

/// Result of analyzing a single comment on request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommentOutcome {
    Analyzed(AnalyzedComment),
    /// Blank text, or another run saved a sentiment first.
    Skipped { comment_id: String },
}

/// Runs the pipeline over persisted comments that have no sentiment yet.
pub struct Reprocessor {
    pipeline: Pipeline,
    store: Arc<dyn CommentStore>,
    options: BatchOptions,
}

fn db(e: anyhow::Error) -> SentimentError {
    SentimentError::Database(format!("{e:#}"))
}

impl Reprocessor {
    pub fn new(pipeline: Pipeline, store: Arc<dyn CommentStore>) -> Self {
        Self {
            pipeline,
            store,
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Analyze and persist every unanalyzed comment on the user's posts.
    ///
    /// Comments are handled one at a time. A failure is recorded in the report
    /// and the loop continues, unless `stop_on_error` is set. The user lock is
    /// refreshed before each comment; if another run has reclaimed it, the
    /// batch stops and reports what it finished.
    pub async fn reprocess_unanalyzed(
        &self,
        user_id: &str,
        lang: Option<&str>,
    ) -> Result<BatchReport, SentimentError> {
        self.require_user(user_id).await?;

        let token = self.acquire_lock(user_id).await?;
        let result = self.run_batch(user_id, token, lang).await;
        self.release_lock(user_id, token).await;
        result
    }

    /// Analyze one pending comment owned by the user. Errors propagate.
    pub async fn reprocess_comment(
        &self,
        user_id: &str,
        comment_id: &str,
        lang: Option<&str>,
    ) -> Result<CommentOutcome, SentimentError> {
        self.require_user(user_id).await?;

        let token = self.acquire_lock(user_id).await?;
        let result = self.run_single(user_id, comment_id, lang).await;
        self.release_lock(user_id, token).await;
        result
    }

    async fn run_batch(
        &self,
        user_id: &str,
        token: Uuid,
        lang: Option<&str>,
    ) -> Result<BatchReport, SentimentError> {
        let comments = self
            .store
            .find_unanalyzed_comments(user_id)
            .await
            .map_err(db)?;
        info!(user_id, pending = comments.len(), "Reprocessing unanalyzed comments");

        let mut report = BatchReport::default();
        for comment in comments {
            if !self
                .store
                .refresh_user_lock(user_id, token)
                .await
                .map_err(db)?
            {
                warn!(user_id, "Reprocessing lock was reclaimed, stopping batch");
                break;
            }

            match self.process_one(&comment, lang).await {
                Ok(CommentOutcome::Analyzed(done)) => report.succeeded.push(done),
                Ok(CommentOutcome::Skipped { comment_id }) => report.skipped.push(comment_id),
                Err(e) => {
                    warn!(user_id, comment_id = comment.id.as_str(), error = %e, "Comment analysis failed");
                    report.failed.push(FailedComment {
                        comment_id: comment.id.clone(),
                        error: e.to_string(),
                    });
                    if self.options.stop_on_error {
                        warn!(user_id, "Stopping batch after first failure");
                        break;
                    }
                }
            }
        }

        info!(
            user_id,
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Reprocessing finished"
        );
        Ok(report)
    }

    async fn run_single(
        &self,
        user_id: &str,
        comment_id: &str,
        lang: Option<&str>,
    ) -> Result<CommentOutcome, SentimentError> {
        let comment = self
            .store
            .find_pending_comment(user_id, comment_id)
            .await
            .map_err(db)?
            .ok_or_else(|| SentimentError::NotFound(format!("pending comment {comment_id}")))?;
        self.process_one(&comment, lang).await
    }

    async fn require_user(&self, user_id: &str) -> Result<(), SentimentError> {
        match self.store.find_user(user_id).await.map_err(db)? {
            Some(_) => Ok(()),
            None => Err(SentimentError::NotFound(format!("user {user_id}"))),
        }
    }

    async fn acquire_lock(&self, user_id: &str) -> Result<Uuid, SentimentError> {
        match self.store.try_lock_user(user_id).await.map_err(db)? {
            Some(token) => Ok(token),
            None => {
                info!(user_id, "Reprocessing already running for user, skipping");
                Err(SentimentError::BatchInProgress(user_id.to_string()))
            }
        }
    }

    /// Called on every exit path once the lock is held.
    async fn release_lock(&self, user_id: &str, token: Uuid) {
        if let Err(e) = self.store.unlock_user(user_id, token).await {
            warn!(user_id, error = %e, "Failed to release reprocessing lock");
        }
    }

    async fn process_one(
        &self,
        comment: &PendingComment,
        lang: Option<&str>,
    ) -> Result<CommentOutcome, SentimentError> {
        let skipped = || CommentOutcome::Skipped {
            comment_id: comment.id.clone(),
        };

        let Some(text) = comment.analyzable_text() else {
            info!(comment_id = comment.id.as_str(), "Skipping comment with blank text");
            return Ok(skipped());
        };

        let state = self.pipeline.run(text, lang).await?;
        let analysis = state.analysis.ok_or_else(|| {
            SentimentError::Validation(format!("pipeline produced no analysis for {}", comment.id))
        })?;

        let record = SentimentRecord::from_analysis(&comment.id, &analysis);
        if !self.store.save_sentiment(&record).await.map_err(db)? {
            info!(comment_id = comment.id.as_str(), "Comment already analyzed, skipping");
            return Ok(skipped());
        }

        Ok(CommentOutcome::Analyzed(AnalyzedComment {
            comment_id: comment.id.clone(),
            analysis,
        }))
    }
}
