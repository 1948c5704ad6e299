// Persistence boundary for the batch loop.
//
// PgCommentStore is the production implementation; MockCommentStore in
// `testing` keeps everything in memory so batch behavior is testable without
// a database.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use sentiscope_common::{PendingComment, SentimentRecord, User};

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Comments on the user's posts that have no sentiment row.
    async fn find_unanalyzed_comments(&self, user_id: &str) -> Result<Vec<PendingComment>>;

    /// A single unanalyzed comment, if it belongs to the user.
    async fn find_pending_comment(
        &self,
        user_id: &str,
        comment_id: &str,
    ) -> Result<Option<PendingComment>>;

    /// Insert the record and its child rows unless the comment already has a
    /// sentiment. Returns whether anything was written.
    async fn save_sentiment(&self, record: &SentimentRecord) -> Result<bool>;

    /// Take the per-user reprocessing lock. Returns the owner token, or `None`
    /// if another run holds it.
    async fn try_lock_user(&self, user_id: &str) -> Result<Option<Uuid>>;

    /// Mark the lock as still in use. Returns `false` once `token` no longer
    /// owns it.
    async fn refresh_user_lock(&self, user_id: &str, token: Uuid) -> Result<bool>;

    /// Release the lock, but only if `token` still owns it.
    async fn unlock_user(&self, user_id: &str, token: Uuid) -> Result<()>;

    async fn sentiments_for_user(&self, user_id: &str) -> Result<Vec<SentimentRecord>>;
}
