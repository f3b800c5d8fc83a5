//! Feed worker daemon.
//!
//! Connects to the database, runs migrations, and processes the feed queue
//! until ctrl-c. Collaborator seams (content store, agent directory) are
//! wired to the database-backed defaults here; deployments embedding the
//! worker in a larger process should use [`lookout_feed::FeedWorker`]
//! directly instead.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use lookout_core::{
    AgentDirectory, ContentStore, NullAnalyzer, RawContent, Result, TopicAgent,
};
use lookout_db::Database;
use lookout_feed::{FeedConfig, FeedProcessor, FeedWorker};

/// Content lookup against the shared `content` table owned by the extraction
/// stage. Kept here because only the daemon knows that table exists; the
/// worker itself is storage-agnostic.
struct PgContentStore {
    pool: sqlx::Pool<sqlx::Postgres>,
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn get_content(&self, content_id: Uuid) -> Result<Option<RawContent>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT payload FROM content WHERE id = $1")
                .bind(content_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(lookout_core::Error::Database)?;

        match row {
            Some((payload,)) => Ok(serde_json::from_value(payload).ok()),
            None => Ok(None),
        }
    }
}

/// Agent directory reading the `topic_agent` registration table.
struct PgAgentDirectory {
    pool: sqlx::Pool<sqlx::Postgres>,
}

struct RegisteredAgent {
    id: Uuid,
}

#[async_trait]
impl TopicAgent for RegisteredAgent {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn ingest(&self, memory: &lookout_core::AgentMemory) -> Result<lookout_core::IngestOutcome> {
        // The memory record is the ingestion contract for registered agents;
        // they poll it on their own schedule.
        info!(
            agent_id = %self.id,
            memory_id = %memory.id,
            "Memory handed to agent"
        );
        Ok(lookout_core::IngestOutcome {
            success: true,
            memories_created: Some(1),
            error: None,
        })
    }
}

#[async_trait]
impl AgentDirectory for PgAgentDirectory {
    async fn agents_for_topic(&self, topic_id: Uuid) -> Result<Vec<Arc<dyn TopicAgent>>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT agent_id FROM topic_agent WHERE topic_id = $1")
                .bind(topic_id)
                .fetch_all(&self.pool)
                .await
                .map_err(lookout_core::Error::Database)?;

        Ok(ids
            .into_iter()
            .map(|id| Arc::new(RegisteredAgent { id }) as Arc<dyn TopicAgent>)
            .collect())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let db = Database::connect(&database_url).await?;
    #[cfg(feature = "migrations")]
    db.migrate().await?;

    let config = FeedConfig::from_env();
    info!(?config, "Starting feed worker");

    let processor = FeedProcessor::new(
        Arc::new(db.feed),
        Arc::new(db.memories),
        Arc::new(PgContentStore {
            pool: db.pool.clone(),
        }),
        Arc::new(PgAgentDirectory {
            pool: db.pool.clone(),
        }),
        Arc::new(NullAnalyzer),
        config,
    );

    let handle = FeedWorker::new(processor).start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    handle.shutdown().await?;

    Ok(())
}
