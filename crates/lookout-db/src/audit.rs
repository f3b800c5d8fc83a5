//! Audit trail repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use lookout_core::{AuditEvent, AuditPage, AuditRecord, AuditTrail, Error, Result, TopicScope};

/// PostgreSQL implementation of the append-only, capped decision log.
///
/// Payloads are stored as text and parsed on read: a row that no longer
/// deserializes as [`AuditEvent`] pages through as [`AuditRecord::Raw`]
/// instead of failing the read.
pub struct PgAuditTrail {
    pool: Pool<Postgres>,
}

impl PgAuditTrail {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditTrail for PgAuditTrail {
    async fn append(&self, scope: &TopicScope, event: &AuditEvent, cap: i64) -> Result<()> {
        let payload = serde_json::to_string(event)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO audit_event (topic_id, shadow, payload) VALUES ($1, $2, $3)",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(&payload)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Keep the newest `cap` entries, oldest dropped.
        sqlx::query(
            "DELETE FROM audit_event
             WHERE topic_id = $1 AND shadow = $2
               AND id NOT IN (
                   SELECT id FROM audit_event
                   WHERE topic_id = $1 AND shadow = $2
                   ORDER BY id DESC
                   LIMIT $3
               )",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(cap)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn page(&self, scope: &TopicScope, offset: i64, limit: i64) -> Result<AuditPage> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_event WHERE topic_id = $1 AND shadow = $2",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let payloads: Vec<String> = sqlx::query_scalar(
            "SELECT payload FROM audit_event
             WHERE topic_id = $1 AND shadow = $2
             ORDER BY id DESC
             OFFSET $3 LIMIT $4",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let items: Vec<AuditRecord> = payloads
            .into_iter()
            .map(|raw| match serde_json::from_str::<AuditEvent>(&raw) {
                Ok(event) => AuditRecord::Event(event),
                Err(_) => AuditRecord::Raw { raw },
            })
            .collect();

        let returned = items.len() as i64;
        Ok(AuditPage {
            items,
            next_offset: offset + returned,
            has_more: offset + returned < total,
        })
    }
}
