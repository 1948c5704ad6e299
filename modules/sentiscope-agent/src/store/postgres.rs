use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use sentiscope_common::{PendingComment, SentimentRecord, User};

use crate::traits::CommentStore;

/// Child rows are `varchar(100)`.
const MAX_CHILD_CHARS: usize = 100;

/// A lock whose heartbeat is older than this is treated as abandoned by a
/// crashed run. The batch loop refreshes the heartbeat before every comment.
const STALE_LOCK_MINUTES: i32 = 30;

/// [`CommentStore`] over the application's Postgres schema.
///
/// Expects `users`, `social_posts`, `social_comments`, `comment_sentiments`,
/// `comment_entities` and `comment_hashtags` to exist. Only the lock table is
/// created here.
#[derive(Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the reprocessing lock table if missing, and add the ownership
    /// columns to tables created before they existed.
    pub async fn ensure_lock_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reprocess_locks (
                user_id      TEXT PRIMARY KEY,
                token        UUID,
                started_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
                heartbeat_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for column in [
            "token UUID",
            "heartbeat_at TIMESTAMPTZ NOT NULL DEFAULT now()",
        ] {
            sqlx::query(&format!(
                "ALTER TABLE reprocess_locks ADD COLUMN IF NOT EXISTS {column}"
            ))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

fn clip(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.chars().take(MAX_CHILD_CHARS).collect())
        .collect()
}

fn row_to_pending(row: (String, String, Option<String>, Option<String>)) -> PendingComment {
    let (id, post_id, text, username) = row;
    PendingComment {
        id,
        post_id,
        text,
        username,
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT id::text, name, email
            FROM users
            WHERE id::text = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, name, email)| User { id, name, email }))
    }

    async fn find_unanalyzed_comments(&self, user_id: &str) -> Result<Vec<PendingComment>> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>, Option<String>)>(
            r#"
            SELECT c.id, c.post_id, c.text, c.username
            FROM social_comments c
            JOIN social_posts p ON p.id = c.post_id
            LEFT JOIN comment_sentiments s ON s.comment_id = c.id
            WHERE p."userId"::text = $1
              AND s.id IS NULL
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_pending).collect())
    }

    async fn find_pending_comment(
        &self,
        user_id: &str,
        comment_id: &str,
    ) -> Result<Option<PendingComment>> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, Option<String>)>(
            r#"
            SELECT c.id, c.post_id, c.text, c.username
            FROM social_comments c
            JOIN social_posts p ON p.id = c.post_id
            LEFT JOIN comment_sentiments s ON s.comment_id = c.id
            WHERE p."userId"::text = $1
              AND c.id = $2
              AND s.id IS NULL
            "#,
        )
        .bind(user_id)
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_pending))
    }

    async fn save_sentiment(&self, record: &SentimentRecord) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent saves for the same comment.
        let exists = sqlx::query("SELECT 1 FROM social_comments WHERE id = $1 FOR UPDATE")
            .bind(&record.comment_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            anyhow::bail!("comment {} does not exist", record.comment_id);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO comment_sentiments (
                id, comment_id, sentiment, intensity, emotion, sentiment_value,
                motivation, interaction_type, impact, feedback, tone, sarcasm,
                created_at, updated_at
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13
            WHERE NOT EXISTS (
                SELECT 1 FROM comment_sentiments WHERE comment_id = $2
            )
            "#,
        )
        .bind(record.id)
        .bind(&record.comment_id)
        .bind(&record.sentiment)
        .bind(&record.intensity)
        .bind(&record.emotion)
        .bind(record.sentiment_value)
        .bind(&record.motivation)
        .bind(&record.interaction_type)
        .bind(&record.impact)
        .bind(&record.feedback)
        .bind(&record.tone)
        .bind(record.sarcasm)
        .bind(record.created_at.naive_utc())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            debug!(comment_id = record.comment_id.as_str(), "Sentiment already exists, skipping");
            return Ok(false);
        }

        if !record.entities.is_empty() {
            sqlx::query(
                "INSERT INTO comment_entities (entity_name, sentiment_id) SELECT unnest($1::text[]), $2",
            )
            .bind(clip(&record.entities))
            .bind(record.id)
            .execute(&mut *tx)
            .await?;
        }

        if !record.hashtags.is_empty() {
            sqlx::query(
                "INSERT INTO comment_hashtags (hashtag, sentiment_id) SELECT unnest($1::text[]), $2",
            )
            .bind(clip(&record.hashtags))
            .bind(record.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn try_lock_user(&self, user_id: &str) -> Result<Option<Uuid>> {
        let reaped = sqlx::query(
            "DELETE FROM reprocess_locks WHERE heartbeat_at < now() - make_interval(mins => $1)",
        )
        .bind(STALE_LOCK_MINUTES)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if reaped > 0 {
            info!(reaped, "Reclaimed stale reprocessing locks");
        }

        let token = Uuid::new_v4();
        let acquired = sqlx::query(
            r#"
            INSERT INTO reprocess_locks (user_id, token, started_at, heartbeat_at)
            VALUES ($1, $2, now(), now())
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok((acquired == 1).then_some(token))
    }

    async fn refresh_user_lock(&self, user_id: &str, token: Uuid) -> Result<bool> {
        let refreshed = sqlx::query(
            "UPDATE reprocess_locks SET heartbeat_at = now() WHERE user_id = $1 AND token = $2",
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(refreshed == 1)
    }

    async fn unlock_user(&self, user_id: &str, token: Uuid) -> Result<()> {
        let released = sqlx::query("DELETE FROM reprocess_locks WHERE user_id = $1 AND token = $2")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if released == 0 {
            warn!(user_id, "Reprocessing lock was already reclaimed by another run");
        }
        Ok(())
    }

    async fn sentiments_for_user(&self, user_id: &str) -> Result<Vec<SentimentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, c.id AS comment_id, s.sentiment, s.intensity, s.emotion,
                   s.sentiment_value::float8 AS sentiment_value, s.motivation,
                   s.tone, s.sarcasm, s.interaction_type, s.impact, s.feedback,
                   s.created_at,
                   COALESCE(
                       (SELECT array_agg(e.entity_name::text ORDER BY e.id)
                        FROM comment_entities e WHERE e.sentiment_id = s.id),
                       '{}'::text[]
                   ) AS entities,
                   COALESCE(
                       (SELECT array_agg(h.hashtag::text ORDER BY h.id)
                        FROM comment_hashtags h WHERE h.sentiment_id = s.id),
                       '{}'::text[]
                   ) AS hashtags
            FROM comment_sentiments s
            JOIN social_comments c ON c.id = s.comment_id
            JOIN social_posts p ON p.id = c.post_id
            WHERE p."userId"::text = $1
            ORDER BY s.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<SentimentRecord> {
                let created_at: NaiveDateTime = row.try_get("created_at")?;
                Ok(SentimentRecord {
                    id: row.try_get::<Uuid, _>("id")?,
                    comment_id: row.try_get("comment_id")?,
                    sentiment: row.try_get("sentiment")?,
                    intensity: row.try_get("intensity")?,
                    emotion: row.try_get("emotion")?,
                    sentiment_value: row.try_get("sentiment_value")?,
                    motivation: row.try_get("motivation")?,
                    tone: row.try_get("tone")?,
                    sarcasm: row.try_get("sarcasm")?,
                    interaction_type: row.try_get("interaction_type")?,
                    impact: row.try_get("impact")?,
                    feedback: row.try_get("feedback")?,
                    entities: row.try_get("entities")?,
                    hashtags: row.try_get("hashtags")?,
                    created_at: created_at.and_utc(),
                })
            })
            .collect()
    }
}
