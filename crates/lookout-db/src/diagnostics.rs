//! Zero-yield diagnostic repository implementation.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres, Row};

use lookout_core::{
    defaults, DiagnosticStatus, DiagnosticsRepository, Error, Result, TopicScope,
    ZeroYieldDiagnostic,
};

/// PostgreSQL storage for the short-lived zero-yield diagnostic.
pub struct PgDiagnosticsRepository {
    pool: Pool<Postgres>,
    ttl_secs: i64,
}

impl PgDiagnosticsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            ttl_secs: defaults::DIAGNOSTIC_TTL_SECS,
        }
    }

    fn status_to_str(status: DiagnosticStatus) -> &'static str {
        match status {
            DiagnosticStatus::Ok => "ok",
            DiagnosticStatus::Warning => "warning",
            DiagnosticStatus::Paused => "paused",
        }
    }

    fn str_to_status(s: &str) -> DiagnosticStatus {
        match s {
            "warning" => DiagnosticStatus::Warning,
            "paused" => DiagnosticStatus::Paused,
            _ => DiagnosticStatus::Ok,
        }
    }
}

#[async_trait]
impl DiagnosticsRepository for PgDiagnosticsRepository {
    async fn set(&self, scope: &TopicScope, diagnostic: &ZeroYieldDiagnostic) -> Result<()> {
        let expires_at = Utc::now() + Duration::seconds(self.ttl_secs);
        sqlx::query(
            "INSERT INTO zero_yield_diagnostic
                 (topic_id, shadow, status, attempts, reason, issued_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (topic_id, shadow)
             DO UPDATE SET status = $3, attempts = $4, reason = $5,
                           issued_at = $6, expires_at = $7",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .bind(Self::status_to_str(diagnostic.status))
        .bind(diagnostic.attempts as i32)
        .bind(&diagnostic.reason)
        .bind(diagnostic.issued_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, scope: &TopicScope) -> Result<Option<ZeroYieldDiagnostic>> {
        let row = sqlx::query(
            "SELECT status, attempts, reason, issued_at FROM zero_yield_diagnostic
             WHERE topic_id = $1 AND shadow = $2 AND expires_at > NOW()",
        )
        .bind(scope.topic_id)
        .bind(scope.shadow)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| ZeroYieldDiagnostic {
            status: Self::str_to_status(row.get("status")),
            attempts: row.get::<i32, _>("attempts") as u32,
            issued_at: row.get("issued_at"),
            reason: row.get("reason"),
        }))
    }

    async fn clear(&self, scope: &TopicScope) -> Result<()> {
        sqlx::query("DELETE FROM zero_yield_diagnostic WHERE topic_id = $1 AND shadow = $2")
            .bind(scope.topic_id)
            .bind(scope.shadow)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            DiagnosticStatus::Ok,
            DiagnosticStatus::Warning,
            DiagnosticStatus::Paused,
        ] {
            let s = PgDiagnosticsRepository::status_to_str(status);
            assert_eq!(PgDiagnosticsRepository::str_to_status(s), status);
        }
    }

    #[test]
    fn test_unknown_status_falls_back_to_ok() {
        assert_eq!(
            PgDiagnosticsRepository::str_to_status("unknown"),
            DiagnosticStatus::Ok
        );
    }
}
