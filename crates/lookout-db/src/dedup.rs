//! Seen-URL set and SimHash fingerprint window repository.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use lookout_core::{defaults, hamming_distance, DedupRepository, Error, Result, TopicScope};

/// PostgreSQL implementation of exact and approximate dedup storage.
///
/// The fingerprint window is intentionally scanned linearly per check: the
/// window is bounded and checks are infrequent relative to fetch latency.
pub struct PgDedupRepository {
    pool: Pool<Postgres>,
    window: i64,
}

impl PgDedupRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            window: defaults::FINGERPRINT_WINDOW,
        }
    }

    /// Override the fingerprint window size (mainly for tests).
    pub fn with_window(mut self, window: i64) -> Self {
        self.window = window;
        self
    }

    /// Drop expired seen-URL rows. Called opportunistically by workers.
    pub async fn purge_expired(&self) -> Result<i64> {
        let result = sqlx::query("DELETE FROM seen_url WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() as i64)
    }
}

#[async_trait]
impl DedupRepository for PgDedupRepository {
    async fn is_seen(&self, scope: &TopicScope, url: &str) -> Result<bool> {
        let seen: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM seen_url
                 WHERE topic_id = $1 AND shadow = $2 AND url = $3
                   AND expires_at > NOW()
             )",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(url)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(seen)
    }

    async fn mark_seen(&self, scope: &TopicScope, url: &str, ttl_days: i64) -> Result<()> {
        let expires_at = Utc::now() + Duration::days(ttl_days);
        sqlx::query(
            "INSERT INTO seen_url (topic_id, shadow, url, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (topic_id, shadow, url) DO UPDATE SET expires_at = $4",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(url)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn is_near_duplicate(
        &self,
        scope: &TopicScope,
        fingerprint: u64,
        threshold: u32,
    ) -> Result<bool> {
        let stored: Vec<i64> = sqlx::query_scalar(
            "SELECT fingerprint FROM content_fingerprint
             WHERE topic_id = $1 AND shadow = $2
             ORDER BY created_at DESC, id DESC
             LIMIT $3",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(self.window)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(stored
            .into_iter()
            .any(|f| hamming_distance(f as u64, fingerprint) <= threshold))
    }

    async fn mark_fingerprint(&self, scope: &TopicScope, fingerprint: u64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO content_fingerprint (id, topic_id, shadow, fingerprint)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::now_v7())
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(fingerprint as i64)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Trim the window to the most recent entries, oldest pruned first.
        sqlx::query(
            "DELETE FROM content_fingerprint
             WHERE topic_id = $1 AND shadow = $2
               AND id NOT IN (
                   SELECT id FROM content_fingerprint
                   WHERE topic_id = $1 AND shadow = $2
                   ORDER BY created_at DESC, id DESC
                   LIMIT $3
               )",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(self.window)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
