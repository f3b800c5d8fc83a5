//! Host reliability map repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres, Row};

use lookout_core::{
    defaults, Error, HostReliability, HostReliabilityRepository, Result, TopicScope,
};

/// PostgreSQL storage for per-host reliability scores.
///
/// The EMA itself is computed by the caller; this layer stores the scalar per
/// host and refreshes the whole map's expiry on every write.
pub struct PgHostReliabilityRepository {
    pool: Pool<Postgres>,
    ttl_days: i64,
}

impl PgHostReliabilityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            ttl_days: defaults::HOST_RELIABILITY_TTL_DAYS,
        }
    }

    /// Drop expired host rows. Called opportunistically by workers.
    pub async fn purge_expired(&self) -> Result<i64> {
        let result = sqlx::query("DELETE FROM host_reliability WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() as i64)
    }
}

#[async_trait]
impl HostReliabilityRepository for PgHostReliabilityRepository {
    async fn get_all(&self, scope: &TopicScope) -> Result<HashMap<String, HostReliability>> {
        let rows = sqlx::query(
            "SELECT host, ema, updated_at FROM host_reliability
             WHERE topic_id = $1 AND shadow = $2 AND expires_at > NOW()",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.get::<String, _>("host"),
                    HostReliability {
                        ema: row.get("ema"),
                        updated_at: row.get("updated_at"),
                    },
                )
            })
            .collect())
    }

    async fn set(&self, scope: &TopicScope, host: &str, value: HostReliability) -> Result<()> {
        let expires_at = Utc::now() + Duration::days(self.ttl_days);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO host_reliability (topic_id, shadow, host, ema, updated_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (topic_id, shadow, host)
             DO UPDATE SET ema = $4, updated_at = $5, expires_at = $6",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(host)
        .bind(value.ema)
        .bind(value.updated_at)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // The map expires as a whole, so a write to any host keeps every
        // host's entry alive.
        sqlx::query(
            "UPDATE host_reliability SET expires_at = $3
             WHERE topic_id = $1 AND shadow = $2",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
