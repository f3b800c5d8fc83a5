//! Run lifecycle registry implementation (active-run lease + run mode).

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres};
use tracing::warn;
use uuid::Uuid;

use lookout_core::{Error, Result, RunMode, RunRegistry, TopicScope};

/// PostgreSQL implementation of the run registry.
///
/// The lease and the mode live in separate tables because they answer
/// different questions: the lease is a mutual-exclusion token with a TTL,
/// the mode is operator intent polled by workers. The compound writes
/// (`set_active_run`, `clear_active_run`) run in one transaction so no
/// reader ever observes a lease without a corresponding `live` mode.
pub struct PgRunRegistry {
    pool: Pool<Postgres>,
}

impl PgRunRegistry {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn mode_to_str(mode: RunMode) -> &'static str {
        match mode {
            RunMode::Live => "live",
            RunMode::Suspended => "suspended",
            RunMode::Paused => "paused",
        }
    }

    fn str_to_mode(s: &str) -> Option<RunMode> {
        match s {
            "live" => Some(RunMode::Live),
            "suspended" => Some(RunMode::Suspended),
            "paused" => Some(RunMode::Paused),
            _ => None,
        }
    }
}

#[async_trait]
impl RunRegistry for PgRunRegistry {
    async fn set_active_run(&self, scope: &TopicScope, run_id: Uuid, ttl_secs: i64) -> Result<()> {
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO run_lease (topic_id, shadow, run_id, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (topic_id, shadow) DO UPDATE SET run_id = $3, expires_at = $4",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(run_id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO run_mode (topic_id, shadow, mode)
             VALUES ($1, $2, 'live')
             ON CONFLICT (topic_id, shadow) DO UPDATE SET mode = 'live'",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn get_active_run(&self, scope: &TopicScope) -> Result<Option<Uuid>> {
        let run_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT run_id FROM run_lease
             WHERE topic_id = $1 AND shadow = $2 AND expires_at > NOW()",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(run_id)
    }

    async fn clear_active_run(&self, scope: &TopicScope) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM run_lease WHERE topic_id = $1 AND shadow = $2")
            .bind(scope.topic_id)
            .bind(scope.shadow)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query("DELETE FROM run_mode WHERE topic_id = $1 AND shadow = $2")
            .bind(scope.topic_id)
            .bind(scope.shadow)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn set_run_state(&self, scope: &TopicScope, mode: RunMode) -> Result<()> {
        sqlx::query(
            "INSERT INTO run_mode (topic_id, shadow, mode)
             VALUES ($1, $2, $3)
             ON CONFLICT (topic_id, shadow) DO UPDATE SET mode = $3",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(Self::mode_to_str(mode))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get_run_state(&self, scope: &TopicScope) -> Result<Option<RunMode>> {
        let stored: Option<String> = sqlx::query_scalar(
            "SELECT mode FROM run_mode WHERE topic_id = $1 AND shadow = $2",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(stored.and_then(|s| {
            let mode = Self::str_to_mode(&s);
            if mode.is_none() {
                warn!(
                    topic_id = %scope.topic_id,
                    value = %s,
                    "Unrecognized run mode in store, treating as unset"
                );
            }
            mode
        }))
    }
}
