//! Frontier queue repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use lookout_core::{defaults, Error, FrontierItem, FrontierRepository, Result, TopicScope};

/// PostgreSQL implementation of the capacity-bounded priority frontier.
///
/// `pop` uses an atomic delete-highest with `FOR UPDATE SKIP LOCKED`, so two
/// concurrent poppers never receive the same item. `push` trims the lowest
/// priority entries beyond the capacity in the same transaction, which means
/// newly pushed high-priority work is never lost to old low-priority backlog.
pub struct PgFrontierRepository {
    pool: Pool<Postgres>,
    capacity: i64,
}

impl PgFrontierRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            capacity: defaults::FRONTIER_CAPACITY,
        }
    }

    /// Override the capacity (mainly for tests).
    pub fn with_capacity(mut self, capacity: i64) -> Self {
        self.capacity = capacity;
        self
    }
}

#[async_trait]
impl FrontierRepository for PgFrontierRepository {
    async fn push(&self, scope: &TopicScope, item: &FrontierItem) -> Result<()> {
        let payload = serde_json::to_value(item)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO frontier_item (id, topic_id, shadow, priority, item)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::now_v7())
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(item.priority)
        .bind(&payload)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Evict everything below the capacity line, lowest priority first.
        sqlx::query(
            "DELETE FROM frontier_item
             WHERE topic_id = $1 AND shadow = $2
               AND id NOT IN (
                   SELECT id FROM frontier_item
                   WHERE topic_id = $1 AND shadow = $2
                   ORDER BY priority DESC, created_at ASC
                   LIMIT $3
               )",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(self.capacity)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn pop(&self, scope: &TopicScope) -> Result<Option<FrontierItem>> {
        let row = sqlx::query(
            "DELETE FROM frontier_item
             WHERE id = (
                 SELECT id FROM frontier_item
                 WHERE topic_id = $1 AND shadow = $2
                 ORDER BY priority DESC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING item",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => {
                let value: serde_json::Value = row.get("item");
                Ok(Some(serde_json::from_value(value)?))
            }
            None => Ok(None),
        }
    }

    async fn size(&self, scope: &TopicScope) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM frontier_item WHERE topic_id = $1 AND shadow = $2",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn clear(&self, scope: &TopicScope) -> Result<()> {
        sqlx::query("DELETE FROM frontier_item WHERE topic_id = $1 AND shadow = $2")
            .bind(scope.topic_id)
            .bind(scope.shadow)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
