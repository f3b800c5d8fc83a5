//! Save counter repository implementation.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres, Row};

use lookout_core::{
    defaults, Error, Result, SaveCounterRepository, SaveCounters, SaveKind, TopicScope,
};

/// PostgreSQL storage for run-level save counters.
///
/// Counters expire as a unit; an increment against an expired row resets it
/// rather than resurrecting stale totals.
pub struct PgSaveCounterRepository {
    pool: Pool<Postgres>,
    ttl_secs: i64,
}

impl PgSaveCounterRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            ttl_secs: defaults::SAVE_COUNTER_TTL_SECS,
        }
    }
}

#[async_trait]
impl SaveCounterRepository for PgSaveCounterRepository {
    async fn increment(&self, scope: &TopicScope, kind: Option<SaveKind>) -> Result<()> {
        let expires_at = Utc::now() + Duration::seconds(self.ttl_secs);
        let (controversy, history) = match kind {
            Some(SaveKind::Controversy) => (1i64, 0i64),
            Some(SaveKind::History) => (0, 1),
            None => (0, 0),
        };

        sqlx::query(
            "INSERT INTO save_counters (topic_id, shadow, total, controversy, history, expires_at)
             VALUES ($1, $2, 1, $3, $4, $5)
             ON CONFLICT (topic_id, shadow) DO UPDATE SET
                 total = CASE WHEN save_counters.expires_at > NOW()
                              THEN save_counters.total + 1 ELSE 1 END,
                 controversy = CASE WHEN save_counters.expires_at > NOW()
                              THEN save_counters.controversy + $3 ELSE $3 END,
                 history = CASE WHEN save_counters.expires_at > NOW()
                              THEN save_counters.history + $4 ELSE $4 END,
                 expires_at = $5",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(controversy)
        .bind(history)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, scope: &TopicScope) -> Result<SaveCounters> {
        let row = sqlx::query(
            "SELECT total, controversy, history FROM save_counters
             WHERE topic_id = $1 AND shadow = $2 AND expires_at > NOW()",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row
            .map(|row| SaveCounters {
                total: row.get("total"),
                controversy: row.get("controversy"),
                history: row.get("history"),
            })
            .unwrap_or_default())
    }
}
