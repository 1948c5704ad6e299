// Test mocks for the sentiment pipeline.
//
// Two mocks matching the two trait boundaries:
// - ScriptedModel (ChatModel): queued replies, records every prompt
// - MockCommentStore (CommentStore): stateful in-memory tables
//
// Plus reply builders for the two stages.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use ai_client::{ChatModel, Completion, Prompt};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use sentiscope_common::{PendingComment, SentimentRecord, User};

use crate::traits::CommentStore;

// ---------------------------------------------------------------------------
// Reply builders
// ---------------------------------------------------------------------------

/// A well-formed contextualization reply, fenced the way models often send it.
pub fn contextualization_reply(original_language: &str, clean_text: &str) -> String {
    format!(
        "```json\n{}\n```",
        json!({"original_language": original_language, "clean_text": clean_text})
    )
}

/// A well-formed analysis reply with the given sentiment.
pub fn analysis_reply(sentiment: &str) -> String {
    json!({
        "sentiment": sentiment,
        "intensity": "moderate",
        "emotion": "joy",
        "sentiment_value": 0.8,
        "motivation": "Cliente satisfeito com a entrega",
        "context": {"tone": "informal", "sarcasm": false},
        "entities": ["Loja Azul"],
        "hashtags": ["#entrega", "#rapido"],
        "interaction_type": "feedback",
        "impact": "medium",
        "feedback": "Continuar assim"
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// Answers calls from a FIFO of scripted replies. Errors once the queue is
/// empty, so tests notice unexpected extra calls.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, content: impl Into<String>) -> Self {
        self.push_reply(content);
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.lock_replies().push_back(Err(message.into()));
        self
    }

    pub fn push_reply(&self, content: impl Into<String>) {
        self.lock_replies().push_back(Ok(content.into()));
    }

    /// Queue a contextualization + analysis pair for one successful run.
    pub fn successful_run(self, sentiment: &str) -> Self {
        self.reply(contextualization_reply("pt", "texto limpo"))
            .reply(analysis_reply(sentiment))
    }

    pub fn calls(&self) -> Vec<Prompt> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.lock_replies().len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.replies.lock().unwrap()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, prompt: Prompt) -> Result<Completion> {
        self.calls.lock().unwrap().push(prompt);
        let next = self.lock_replies().pop_front();
        match next {
            Some(Ok(content)) => Ok(Completion::new(content)),
            Some(Err(message)) => Err(anyhow!(message)),
            None => bail!("ScriptedModel: no reply queued"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockCommentStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    users: HashMap<String, User>,
    /// Comment plus owning user id, in insertion order.
    comments: Vec<(String, PendingComment)>,
    sentiments: Vec<SentimentRecord>,
    /// Lock owner token per user.
    locks: HashMap<String, Uuid>,
    failing_saves: HashSet<String>,
    racing_saves: HashSet<String>,
    lock_attempts: usize,
    lock_refreshes: usize,
    /// Hand the lock to another run after this many successful refreshes.
    lose_lock_after: Option<usize>,
}

/// In-memory store with the same idempotency and locking rules as Postgres.
pub struct MockCommentStore {
    state: Mutex<StoreState>,
}

impl MockCommentStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn with_user(self, id: &str) -> Self {
        self.state.lock().unwrap().users.insert(
            id.to_string(),
            User {
                id: id.to_string(),
                name: format!("User {id}"),
                email: format!("{id}@example.com"),
            },
        );
        self
    }

    pub fn with_comment(self, user_id: &str, comment_id: &str, text: Option<&str>) -> Self {
        self.state.lock().unwrap().comments.push((
            user_id.to_string(),
            PendingComment {
                id: comment_id.to_string(),
                post_id: format!("post-of-{user_id}"),
                text: text.map(str::to_string),
                username: Some("fan".to_string()),
            },
        ));
        self
    }

    pub fn with_sentiment(self, record: SentimentRecord) -> Self {
        self.state.lock().unwrap().sentiments.push(record);
        self
    }

    /// Make `save_sentiment` fail for this comment.
    pub fn failing_save(self, comment_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_saves
            .insert(comment_id.to_string());
        self
    }

    /// Make `save_sentiment` report that another run saved this comment first.
    pub fn racing_save(self, comment_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .racing_saves
            .insert(comment_id.to_string());
        self
    }

    /// Simulate another run holding the user's lock.
    pub fn locked_for(self, user_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .locks
            .insert(user_id.to_string(), Uuid::new_v4());
        self
    }

    /// After `refreshes` successful refreshes, the next one finds the lock
    /// reclaimed by another run.
    pub fn lock_lost_after(self, refreshes: usize) -> Self {
        self.state.lock().unwrap().lose_lock_after = Some(refreshes);
        self
    }

    /// Drop the user's lock as stale-lock reaping would.
    pub fn expire_lock(&self, user_id: &str) {
        self.state.lock().unwrap().locks.remove(user_id);
    }

    pub fn saved(&self) -> Vec<SentimentRecord> {
        self.state.lock().unwrap().sentiments.clone()
    }

    pub fn saved_for(&self, comment_id: &str) -> Option<SentimentRecord> {
        self.saved().into_iter().find(|r| r.comment_id == comment_id)
    }

    pub fn entity_rows(&self) -> usize {
        self.saved().iter().map(|r| r.entities.len()).sum()
    }

    pub fn hashtag_rows(&self) -> usize {
        self.saved().iter().map(|r| r.hashtags.len()).sum()
    }

    pub fn is_locked(&self, user_id: &str) -> bool {
        self.state.lock().unwrap().locks.contains_key(user_id)
    }

    pub fn lock_attempts(&self) -> usize {
        self.state.lock().unwrap().lock_attempts
    }

    pub fn lock_refreshes(&self) -> usize {
        self.state.lock().unwrap().lock_refreshes
    }
}

impl Default for MockCommentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn has_sentiment(state: &StoreState, comment_id: &str) -> bool {
    state.sentiments.iter().any(|s| s.comment_id == comment_id)
}

#[async_trait]
impl CommentStore for MockCommentStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(user_id).cloned())
    }

    async fn find_unanalyzed_comments(&self, user_id: &str) -> Result<Vec<PendingComment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .comments
            .iter()
            .filter(|(owner, c)| owner == user_id && !has_sentiment(&state, &c.id))
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn find_pending_comment(
        &self,
        user_id: &str,
        comment_id: &str,
    ) -> Result<Option<PendingComment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .comments
            .iter()
            .find(|(owner, c)| {
                owner == user_id && c.id == comment_id && !has_sentiment(&state, &c.id)
            })
            .map(|(_, c)| c.clone()))
    }

    async fn save_sentiment(&self, record: &SentimentRecord) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.failing_saves.contains(&record.comment_id) {
            bail!("MockCommentStore: write failed for {}", record.comment_id);
        }
        if state.racing_saves.contains(&record.comment_id)
            || has_sentiment(&state, &record.comment_id)
        {
            return Ok(false);
        }
        state.sentiments.push(record.clone());
        Ok(true)
    }

    async fn try_lock_user(&self, user_id: &str) -> Result<Option<Uuid>> {
        let mut state = self.state.lock().unwrap();
        state.lock_attempts += 1;
        if state.locks.contains_key(user_id) {
            return Ok(None);
        }
        let token = Uuid::new_v4();
        state.locks.insert(user_id.to_string(), token);
        Ok(Some(token))
    }

    async fn refresh_user_lock(&self, user_id: &str, token: Uuid) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.lose_lock_after == Some(state.lock_refreshes) {
            state.locks.insert(user_id.to_string(), Uuid::new_v4());
        }
        if state.locks.get(user_id) != Some(&token) {
            return Ok(false);
        }
        state.lock_refreshes += 1;
        Ok(true)
    }

    async fn unlock_user(&self, user_id: &str, token: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.locks.get(user_id) == Some(&token) {
            state.locks.remove(user_id);
        }
        Ok(())
    }

    async fn sentiments_for_user(&self, user_id: &str) -> Result<Vec<SentimentRecord>> {
        let state = self.state.lock().unwrap();
        let owned: HashSet<&str> = state
            .comments
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, c)| c.id.as_str())
            .collect();
        Ok(state
            .sentiments
            .iter()
            .filter(|s| owned.contains(s.comment_id.as_str()))
            .cloned()
            .collect())
    }
}
