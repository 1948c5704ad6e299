//! Batch reprocessing against the in-memory store.

use std::sync::Arc;

use sentiscope_agent::batch::{BatchOptions, CommentOutcome, Reprocessor};
use sentiscope_agent::testing::{
    analysis_reply, contextualization_reply, MockCommentStore, ScriptedModel,
};
use sentiscope_agent::{CommentStore, Pipeline};
use sentiscope_common::{Analysis, Sentiment, SentimentError, SentimentRecord, SentimentStats};

const USER: &str = "user-1";

fn reprocessor(model: &Arc<ScriptedModel>, store: &Arc<MockCommentStore>) -> Reprocessor {
    Reprocessor::new(Pipeline::new(model.clone()), store.clone())
}

fn existing_sentiment(comment_id: &str) -> SentimentRecord {
    SentimentRecord::from_analysis(comment_id, &Analysis::new(Sentiment::Neutral))
}

#[tokio::test]
async fn only_unanalyzed_comments_are_processed() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("Amei o atendimento"))
            .with_comment(USER, "c2", Some("Demorou demais"))
            .with_comment(USER, "c3", Some("Ok"))
            .with_sentiment(existing_sentiment("c2")),
    );
    let model = Arc::new(
        ScriptedModel::new()
            .successful_run("positive")
            .successful_run("neutral"),
    );

    let report = reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert_eq!(model.call_count(), 4);
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.succeeded[0].comment_id, "c1");
    assert_eq!(report.succeeded[1].comment_id, "c3");
    assert!(report.skipped.is_empty());
    assert!(report.failed.is_empty());

    let saved = store.saved();
    assert_eq!(saved.len(), 3);
    let c1 = store.saved_for("c1").unwrap();
    assert_eq!(c1.sentiment, "positive");
    assert_eq!(c1.entities, vec!["Loja Azul"]);
    // Each new record carries one entity and two hashtags.
    assert_eq!(store.entity_rows(), 2);
    assert_eq!(store.hashtag_rows(), 4);
}

#[tokio::test]
async fn second_run_finds_nothing_to_do() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("Top")),
    );
    let model = Arc::new(ScriptedModel::new().successful_run("positive"));
    let reprocessor = reprocessor(&model, &store);

    reprocessor.reprocess_unanalyzed(USER, None).await.unwrap();
    let again = reprocessor.reprocess_unanalyzed(USER, None).await.unwrap();

    assert_eq!(again.processed(), 0);
    assert_eq!(model.call_count(), 2);
    assert_eq!(store.saved().len(), 1);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let store = Arc::new(MockCommentStore::new());
    let model = Arc::new(ScriptedModel::new());

    let err = reprocessor(&model, &store)
        .reprocess_unanalyzed("ghost", None)
        .await
        .unwrap_err();

    assert!(matches!(err, SentimentError::NotFound(_)));
    assert_eq!(store.lock_attempts(), 0);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn blank_comments_are_skipped_without_llm_calls() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "empty", Some("   "))
            .with_comment(USER, "null", None)
            .with_comment(USER, "real", Some("Bom demais")),
    );
    let model = Arc::new(ScriptedModel::new().successful_run("positive"));

    let report = reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert_eq!(report.skipped, vec!["empty", "null"]);
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(model.call_count(), 2);
}

#[tokio::test]
async fn failures_are_isolated_per_comment() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("primeiro"))
            .with_comment(USER, "c2", Some("segundo"))
            .with_comment(USER, "c3", Some("terceiro")),
    );
    let model = Arc::new(
        ScriptedModel::new()
            .successful_run("positive")
            .reply("definitely not json")
            .successful_run("negative"),
    );

    let report = reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].comment_id, "c2");
    assert!(report.failed[0].error.contains("Malformed"));
    assert!(store.saved_for("c2").is_none());
    assert_eq!(store.saved_for("c3").unwrap().sentiment, "negative");
}

#[tokio::test]
async fn stop_on_error_aborts_after_first_failure() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("primeiro"))
            .with_comment(USER, "c2", Some("segundo"))
            .with_comment(USER, "c3", Some("terceiro")),
    );
    let model = Arc::new(
        ScriptedModel::new()
            .successful_run("positive")
            .fail("quota exceeded")
            .successful_run("negative"),
    );

    let report = reprocessor(&model, &store)
        .with_options(BatchOptions::builder().stop_on_error(true).build())
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].comment_id, "c2");
    assert_eq!(model.call_count(), 3);
    assert!(store.saved_for("c3").is_none());
    assert!(!store.is_locked(USER));
}

#[tokio::test]
async fn save_failure_is_recorded_and_lock_released() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("vai falhar"))
            .failing_save("c1"),
    );
    let model = Arc::new(ScriptedModel::new().successful_run("negative"));

    let report = reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("Database error"));
    assert!(!store.is_locked(USER));
}

#[tokio::test]
async fn held_lock_rejects_concurrent_batch() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("texto"))
            .locked_for(USER),
    );
    let model = Arc::new(ScriptedModel::new());

    let err = reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SentimentError::BatchInProgress(ref user) if user == USER));
    assert_eq!(model.call_count(), 0);
    // The other run's lock is left alone.
    assert!(store.is_locked(USER));
}

#[tokio::test]
async fn lock_is_released_after_success() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("texto")),
    );
    let model = Arc::new(ScriptedModel::new().successful_run("positive"));

    reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert!(!store.is_locked(USER));
    assert!(store.try_lock_user(USER).await.unwrap().is_some());
}

#[tokio::test]
async fn comment_saved_by_another_run_is_skipped() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("corrida"))
            .racing_save("c1"),
    );
    let model = Arc::new(ScriptedModel::new().successful_run("positive"));

    let report = reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert_eq!(report.skipped, vec!["c1"]);
    assert!(report.succeeded.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(model.call_count(), 2);
    assert!(!store.is_locked(USER));
}

#[tokio::test]
async fn lock_is_refreshed_before_each_comment() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("um"))
            .with_comment(USER, "c2", Some("dois"))
            .with_comment(USER, "c3", Some("três")),
    );
    let model = Arc::new(
        ScriptedModel::new()
            .successful_run("positive")
            .successful_run("positive")
            .successful_run("positive"),
    );

    reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert_eq!(store.lock_refreshes(), 3);
}

#[tokio::test]
async fn reclaimed_lock_stops_batch_and_survives_release() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("um"))
            .with_comment(USER, "c2", Some("dois"))
            .with_comment(USER, "c3", Some("três"))
            .lock_lost_after(1),
    );
    let model = Arc::new(
        ScriptedModel::new()
            .successful_run("positive")
            .successful_run("positive")
            .successful_run("positive"),
    );

    let report = reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].comment_id, "c1");
    assert!(store.saved_for("c2").is_none());
    assert_eq!(model.call_count(), 2);
    // The run that took over still holds its lock.
    assert!(store.is_locked(USER));
}

#[tokio::test]
async fn stale_token_cannot_release_or_refresh_a_new_lock() {
    let store = MockCommentStore::new().with_user(USER);

    let first = store.try_lock_user(USER).await.unwrap().unwrap();
    store.expire_lock(USER);
    let second = store.try_lock_user(USER).await.unwrap().unwrap();
    assert_ne!(first, second);

    store.unlock_user(USER, first).await.unwrap();
    assert!(store.is_locked(USER));
    assert!(!store.refresh_user_lock(USER, first).await.unwrap());
    assert!(store.try_lock_user(USER).await.unwrap().is_none());

    store.unlock_user(USER, second).await.unwrap();
    assert!(!store.is_locked(USER));
}

#[tokio::test]
async fn comments_of_other_users_are_untouched() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_user("user-2")
            .with_comment(USER, "mine", Some("meu"))
            .with_comment("user-2", "theirs", Some("deles")),
    );
    let model = Arc::new(ScriptedModel::new().successful_run("positive"));

    let report = reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert!(store.saved_for("theirs").is_none());
}

#[tokio::test]
async fn batch_passes_language_to_both_stages() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("Muy bueno")),
    );
    let model = Arc::new(
        ScriptedModel::new()
            .reply(contextualization_reply("es", "Very good"))
            .reply(analysis_reply("positive")),
    );

    reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, Some("en"))
        .await
        .unwrap();

    let calls = model.calls();
    let ai_client::Prompt::Text(first) = &calls[0] else {
        panic!("contextualization should send a text prompt");
    };
    assert!(first.contains("Translate it into en"));
}

#[tokio::test]
async fn reprocess_comment_analyzes_a_single_comment() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("um"))
            .with_comment(USER, "c2", Some("dois")),
    );
    let model = Arc::new(ScriptedModel::new().successful_run("positive"));

    let outcome = reprocessor(&model, &store)
        .reprocess_comment(USER, "c2", None)
        .await
        .unwrap();

    match outcome {
        CommentOutcome::Analyzed(done) => assert_eq!(done.comment_id, "c2"),
        other => panic!("expected Analyzed, got {other:?}"),
    }
    assert!(store.saved_for("c1").is_none());
    assert!(!store.is_locked(USER));
}

#[tokio::test]
async fn reprocess_comment_requires_a_pending_comment() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "done", Some("já analisado"))
            .with_sentiment(existing_sentiment("done")),
    );
    let model = Arc::new(ScriptedModel::new());
    let reprocessor = reprocessor(&model, &store);

    let missing = reprocessor
        .reprocess_comment(USER, "nope", None)
        .await
        .unwrap_err();
    let analyzed = reprocessor
        .reprocess_comment(USER, "done", None)
        .await
        .unwrap_err();

    assert!(matches!(missing, SentimentError::NotFound(_)));
    assert!(matches!(analyzed, SentimentError::NotFound(_)));
    assert!(!store.is_locked(USER));
}

#[tokio::test]
async fn reprocess_comment_propagates_pipeline_errors() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("texto")),
    );
    let model = Arc::new(ScriptedModel::new().reply("```json\n[]\n```"));

    let err = reprocessor(&model, &store)
        .reprocess_comment(USER, "c1", None)
        .await
        .unwrap_err();

    assert!(err.is_malformed());
    assert!(!store.is_locked(USER));
}

#[tokio::test]
async fn stats_reflect_persisted_batch_results() {
    let store = Arc::new(
        MockCommentStore::new()
            .with_user(USER)
            .with_comment(USER, "c1", Some("um"))
            .with_comment(USER, "c2", Some("dois"))
            .with_comment(USER, "c3", Some("três")),
    );
    let model = Arc::new(
        ScriptedModel::new()
            .successful_run("positive")
            .successful_run("positive")
            .successful_run("negative"),
    );

    reprocessor(&model, &store)
        .reprocess_unanalyzed(USER, None)
        .await
        .unwrap();

    let records = store.sentiments_for_user(USER).await.unwrap();
    let stats = SentimentStats::from_records(&records);

    assert_eq!(stats.total, 3);
    assert_eq!(stats.prevailing_sentiment.as_deref(), Some("positive"));
    assert_eq!(stats.distribution[0].percentage, 66.67);
    assert_eq!(stats.average_sentiment_value, Some(0.8));
    assert_eq!(stats.top_emotions(1)[0].label, "joy");
}
