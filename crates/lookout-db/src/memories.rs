//! Agent memory repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use lookout_core::{AgentMemory, Error, MemoryRepository, NewAgentMemory, Result};

/// PostgreSQL storage for agent memory records.
///
/// Uniqueness on `(topic_id, content_id, content_hash)` is enforced here, so
/// a memory is created exactly once per triple no matter how many workers
/// race on it.
pub struct PgMemoryRepository {
    pool: Pool<Postgres>,
}

impl PgMemoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemoryRepository for PgMemoryRepository {
    async fn exists(&self, topic_id: Uuid, content_id: Uuid, content_hash: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
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
        Ok(exists)
    }

    async fn create(&self, memory: &NewAgentMemory) -> Result<Option<AgentMemory>> {
        let row = sqlx::query(
            "INSERT INTO agent_memory
                 (id, topic_id, content_id, content_hash, agent_id, title, content)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (topic_id, content_id, content_hash) DO NOTHING
             RETURNING id, topic_id, content_id, content_hash, agent_id, title, content,
                       created_at",
        )
        .bind(Uuid::now_v7())
        .bind(memory.topic_id)
        .bind(memory.content_id)
        .bind(&memory.content_hash)
        .bind(memory.agent_id)
        .bind(&memory.title)
        .bind(&memory.content)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| AgentMemory {
            id: row.get("id"),
            topic_id: row.get("topic_id"),
            content_id: row.get("content_id"),
            content_hash: row.get("content_hash"),
            agent_id: row.get("agent_id"),
            title: row.get("title"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        }))
    }
}
