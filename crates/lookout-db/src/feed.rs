//! Feed queue repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use lookout_core::{
    EnqueueOutcome, Error, FeedItem, FeedQueueRepository, FeedQueueStats, FeedStatus, Result,
};

/// PostgreSQL implementation of the idempotent content-to-memory queue.
///
/// Enqueue uses an atomic `INSERT … WHERE NOT EXISTS` on the
/// `(topic_id, content_id, content_hash)` triple so concurrent producers
/// cannot create duplicates, and short-circuits when a memory record for the
/// triple already exists. Terminal rows are never deleted.
pub struct PgFeedQueueRepository {
    pool: Pool<Postgres>,
}

impl PgFeedQueueRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn status_to_str(status: FeedStatus) -> &'static str {
        match status {
            FeedStatus::Pending => "pending",
            FeedStatus::Processing => "processing",
            FeedStatus::Done => "done",
            FeedStatus::Failed => "failed",
        }
    }

    fn str_to_status(s: &str) -> FeedStatus {
        match s {
            "processing" => FeedStatus::Processing,
            "done" => FeedStatus::Done,
            "failed" => FeedStatus::Failed,
            _ => FeedStatus::Pending,
        }
    }

    fn parse_item_row(row: sqlx::postgres::PgRow) -> FeedItem {
        FeedItem {
            id: row.get("id"),
            topic_id: row.get("topic_id"),
            content_id: row.get("content_id"),
            content_hash: row.get("content_hash"),
            priority: row.get("priority"),
            status: Self::str_to_status(row.get("status")),
            attempts: row.get("attempts"),
            last_error: row.get("last_error"),
            enqueued_at: row.get("enqueued_at"),
            picked_at: row.get("picked_at"),
        }
    }
}

const ITEM_COLUMNS: &str = "id, topic_id, content_id, content_hash, priority, status::text, \
                            attempts, last_error, enqueued_at, picked_at";

#[async_trait]
impl FeedQueueRepository for PgFeedQueueRepository {
    async fn enqueue(
        &self,
        topic_id: Uuid,
        content_id: Uuid,
        content_hash: &str,
        priority: i32,
    ) -> Result<EnqueueOutcome> {
        // A memory record is proof of prior success for the triple.
        let processed: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM agent_memory
                 WHERE topic_id = $1 AND content_id = $2 AND content_hash = $3
             )",
        )
        .bind(topic_id)
        .bind(content_id)
        .bind(content_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        if processed {
            return Ok(EnqueueOutcome::AlreadyProcessed);
        }

        // Atomic check-and-insert so concurrent producers racing on the same
        // triple yield exactly one stored item.
        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO feed_queue (id, topic_id, content_id, content_hash, priority, status)
             SELECT $1, $2, $3, $4, $5, 'pending'::feed_status
             WHERE NOT EXISTS (
                 SELECT 1 FROM feed_queue
                 WHERE topic_id = $2 AND content_id = $3 AND content_hash = $4
             )
             ON CONFLICT (topic_id, content_id, content_hash) DO NOTHING
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(topic_id)
        .bind(content_id)
        .bind(content_hash)
        .bind(priority)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(match inserted {
            Some(id) => EnqueueOutcome::Enqueued(id),
            None => EnqueueOutcome::AlreadyEnqueued,
        })
    }

    async fn get(&self, item_id: Uuid) -> Result<Option<FeedItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM feed_queue WHERE id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_item_row))
    }

    async fn list_pending(&self, limit: i64, topic_id: Option<Uuid>) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM feed_queue
             WHERE status = 'pending'::feed_status
               AND ($2::uuid IS NULL OR topic_id = $2)
             ORDER BY priority DESC, enqueued_at ASC
             LIMIT $1",
        )
        .bind(limit)
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(ids)
    }

    async fn begin_processing(&self, item_id: Uuid) -> Result<Option<FeedItem>> {
        let row = sqlx::query(&format!(
            "UPDATE feed_queue
             SET status = 'processing'::feed_status, attempts = attempts + 1, picked_at = NOW()
             WHERE id = $1 AND status <> 'done'::feed_status
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_item_row))
    }

    async fn mark_done(&self, item_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE feed_queue SET status = 'done'::feed_status, last_error = NULL
             WHERE id = $1",
        )
        .bind(item_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_failed(&self, item_id: Uuid, reason: &str) -> Result<()> {
        sqlx::query(
            "UPDATE feed_queue SET status = 'failed'::feed_status, last_error = $2
             WHERE id = $1",
        )
        .bind(item_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn return_pending(&self, item_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE feed_queue SET status = 'pending'::feed_status, last_error = $2
             WHERE id = $1",
        )
        .bind(item_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn requeue_stalled(&self, older_than_secs: i64) -> Result<i64> {
        let result = sqlx::query(
            "UPDATE feed_queue
             SET status = 'pending'::feed_status
             WHERE status = 'processing'::feed_status
               AND picked_at < NOW() - ($1 * INTERVAL '1 second')",
        )
        .bind(older_than_secs as f64)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() as i64)
    }

    async fn stats(&self) -> Result<FeedQueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'processing') as processing,
                COUNT(*) FILTER (WHERE status = 'done') as done,
                COUNT(*) FILTER (WHERE status = 'failed') as failed,
                COUNT(*) as total
             FROM feed_queue",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(FeedQueueStats {
            pending: row.get::<i64, _>("pending"),
            processing: row.get::<i64, _>("processing"),
            done: row.get::<i64, _>("done"),
            failed: row.get::<i64, _>("failed"),
            total: row.get::<i64, _>("total"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            FeedStatus::Pending,
            FeedStatus::Processing,
            FeedStatus::Done,
            FeedStatus::Failed,
        ] {
            let s = PgFeedQueueRepository::status_to_str(status);
            assert_eq!(PgFeedQueueRepository::str_to_status(s), status);
        }
    }

    #[test]
    fn test_unknown_status_falls_back_to_pending() {
        assert_eq!(
            PgFeedQueueRepository::str_to_status("unknown"),
            FeedStatus::Pending
        );
        assert_eq!(PgFeedQueueRepository::str_to_status(""), FeedStatus::Pending);
    }

    #[test]
    fn test_status_strings_are_unique() {
        let statuses = [
            FeedStatus::Pending,
            FeedStatus::Processing,
            FeedStatus::Done,
            FeedStatus::Failed,
        ];
        let strings: Vec<&str> = statuses
            .iter()
            .map(|s| PgFeedQueueRepository::status_to_str(*s))
            .collect();
        let mut unique = strings.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(strings.len(), unique.len());
    }
}
