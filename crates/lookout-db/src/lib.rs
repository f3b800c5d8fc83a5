//! # lookout-db
//!
//! PostgreSQL storage layer for the lookout discovery pipeline.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for every pipeline component: frontier
//!   queue, seen-URL set and fingerprint window, host reliability, run
//!   registry, audit trail, diagnostics, save counters, feed queue, and
//!   agent memory
//! - SQL migrations (behind the `migrations` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use lookout_db::Database;
//! use lookout_core::{FrontierRepository, TopicScope};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/lookout").await?;
//!     let scope = TopicScope::live(topic_id);
//!
//!     while let Some(item) = db.frontier.pop(&scope).await? {
//!         // evaluate the candidate…
//!     }
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod counters;
pub mod dedup;
pub mod diagnostics;
pub mod feed;
pub mod frontier;
pub mod hosts;
pub mod memories;
pub mod pool;
pub mod runs;

// Test fixtures for integration tests
// Note: always compiled so integration tests (in tests/) can use
// DEFAULT_TEST_DATABASE_URL.
pub mod test_fixtures;

// Re-export core types
pub use lookout_core::*;

// Re-export repository implementations
pub use audit::PgAuditTrail;
pub use counters::PgSaveCounterRepository;
pub use dedup::PgDedupRepository;
pub use diagnostics::PgDiagnosticsRepository;
pub use feed::PgFeedQueueRepository;
pub use frontier::PgFrontierRepository;
pub use hosts::PgHostReliabilityRepository;
pub use memories::PgMemoryRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use runs::PgRunRegistry;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Frontier queue of fetch candidates.
    pub frontier: PgFrontierRepository,
    /// Seen-URL set and fingerprint window.
    pub dedup: PgDedupRepository,
    /// Host reliability map.
    pub hosts: PgHostReliabilityRepository,
    /// Active-run lease and run mode.
    pub runs: PgRunRegistry,
    /// Append-only decision log.
    pub audit: PgAuditTrail,
    /// Zero-yield diagnostics.
    pub diagnostics: PgDiagnosticsRepository,
    /// Run-level save counters.
    pub counters: PgSaveCounterRepository,
    /// Idempotent content-to-memory queue.
    pub feed: PgFeedQueueRepository,
    /// Agent memory records.
    pub memories: PgMemoryRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            frontier: PgFrontierRepository::new(pool.clone()),
            dedup: PgDedupRepository::new(pool.clone()),
            hosts: PgHostReliabilityRepository::new(pool.clone()),
            runs: PgRunRegistry::new(pool.clone()),
            audit: PgAuditTrail::new(pool.clone()),
            diagnostics: PgDiagnosticsRepository::new(pool.clone()),
            counters: PgSaveCounterRepository::new(pool.clone()),
            feed: PgFeedQueueRepository::new(pool.clone()),
            memories: PgMemoryRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Connect to the test database (for integration tests).
    pub async fn connect_test() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| test_fixtures::DEFAULT_TEST_DATABASE_URL.to_string());
        Self::connect(&database_url).await
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
