//! Repository traits and external-collaborator contracts.
//!
//! Storage traits are implemented by `lookout-db` against PostgreSQL; the
//! collaborator traits (`TextAnalyzer`, `AgentDirectory`, `TopicAgent`) are
//! the narrow seams through which extraction and agent ingestion — both
//! external to this core — are consumed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AgentMemory, AuditEvent, AuditPage, EnqueueOutcome, Entity, FeedItem, FeedQueueStats,
    FrontierItem, HostReliability, IngestOutcome, NewAgentMemory, RunMode, SaveCounters, SaveKind,
    TimelineEntry, ZeroYieldDiagnostic,
};
use crate::scope::TopicScope;

// =============================================================================
// STORAGE
// =============================================================================

/// Per-topic priority queue of fetch candidates.
#[async_trait]
pub trait FrontierRepository: Send + Sync {
    /// Insert an item ordered by priority. If the queue would exceed its
    /// capacity, the lowest-priority entries beyond the cap are dropped.
    async fn push(&self, scope: &TopicScope, item: &FrontierItem) -> Result<()>;

    /// Atomically remove and return the highest-priority item. Two
    /// concurrent poppers never receive the same item.
    async fn pop(&self, scope: &TopicScope) -> Result<Option<FrontierItem>>;

    /// Number of queued items in this scope.
    async fn size(&self, scope: &TopicScope) -> Result<i64>;

    /// Drop every queued item in this scope.
    async fn clear(&self, scope: &TopicScope) -> Result<()>;
}

/// Exact (seen-URL) and approximate (SimHash window) duplicate detection.
///
/// Both structures are advisory: a miss degrades quality, not correctness.
#[async_trait]
pub trait DedupRepository: Send + Sync {
    /// Whether this canonical URL was already processed (and not yet expired).
    async fn is_seen(&self, scope: &TopicScope, url: &str) -> Result<bool>;

    /// Record a processed URL with the given TTL.
    async fn mark_seen(&self, scope: &TopicScope, url: &str, ttl_days: i64) -> Result<()>;

    /// Whether any fingerprint in the recent window is within `threshold`
    /// Hamming bits of `fingerprint`.
    async fn is_near_duplicate(
        &self,
        scope: &TopicScope,
        fingerprint: u64,
        threshold: u32,
    ) -> Result<bool>;

    /// Record a fingerprint and trim the window to its bound (oldest first).
    async fn mark_fingerprint(&self, scope: &TopicScope, fingerprint: u64) -> Result<()>;
}

/// Per-host reliability score storage. The EMA math lives with the caller;
/// this layer only stores and retrieves the scalar per host.
#[async_trait]
pub trait HostReliabilityRepository: Send + Sync {
    /// The full host → reliability map for this scope (expired maps read
    /// as empty).
    async fn get_all(&self, scope: &TopicScope) -> Result<HashMap<String, HostReliability>>;

    /// Upsert one host's score, refreshing the map's expiry.
    async fn set(&self, scope: &TopicScope, host: &str, value: HostReliability) -> Result<()>;
}

/// Active-run lease and run-mode registry.
///
/// At most one non-expired lease exists per scope. Setting the lease also
/// sets mode to `live` in the same transaction; clearing it clears both.
#[async_trait]
pub trait RunRegistry: Send + Sync {
    /// Atomically store `run_id` as the active lease (with TTL) and set the
    /// run mode to [`RunMode::Live`]. No reader ever observes a lease
    /// without a `live` mode.
    async fn set_active_run(&self, scope: &TopicScope, run_id: Uuid, ttl_secs: i64) -> Result<()>;

    /// The current non-expired active run, if any.
    async fn get_active_run(&self, scope: &TopicScope) -> Result<Option<Uuid>>;

    /// Atomically delete both the lease and the mode key.
    async fn clear_active_run(&self, scope: &TopicScope) -> Result<()>;

    /// Set the run mode independently of the lease (operator intent).
    async fn set_run_state(&self, scope: &TopicScope, mode: RunMode) -> Result<()>;

    /// The current run mode, if set.
    async fn get_run_state(&self, scope: &TopicScope) -> Result<Option<RunMode>>;
}

/// Append-only, capacity-capped, paginated decision log.
#[async_trait]
pub trait AuditTrail: Send + Sync {
    /// Insert an event at the head, trimming the oldest entries beyond `cap`.
    async fn append(&self, scope: &TopicScope, event: &AuditEvent, cap: i64) -> Result<()>;

    /// Read a contiguous page starting at `offset`, newest first.
    async fn page(&self, scope: &TopicScope, offset: i64, limit: i64) -> Result<AuditPage>;
}

/// Short-lived zero-yield diagnostic storage.
#[async_trait]
pub trait DiagnosticsRepository: Send + Sync {
    async fn set(&self, scope: &TopicScope, diagnostic: &ZeroYieldDiagnostic) -> Result<()>;
    async fn get(&self, scope: &TopicScope) -> Result<Option<ZeroYieldDiagnostic>>;
    async fn clear(&self, scope: &TopicScope) -> Result<()>;
}

/// Per-topic save counters (run-level reporting only).
#[async_trait]
pub trait SaveCounterRepository: Send + Sync {
    /// Atomically bump `total` and, when given, the category counter,
    /// refreshing the expiry.
    async fn increment(&self, scope: &TopicScope, kind: Option<SaveKind>) -> Result<()>;

    /// Current (non-expired) counter values.
    async fn get(&self, scope: &TopicScope) -> Result<SaveCounters>;
}

/// Durable, idempotent content-to-memory work queue.
#[async_trait]
pub trait FeedQueueRepository: Send + Sync {
    /// Idempotently insert a PENDING item for the triple. No-ops when the
    /// triple is already queued or already has a memory record.
    async fn enqueue(
        &self,
        topic_id: Uuid,
        content_id: Uuid,
        content_hash: &str,
        priority: i32,
    ) -> Result<EnqueueOutcome>;

    /// Load one item by id.
    async fn get(&self, item_id: Uuid) -> Result<Option<FeedItem>>;

    /// Ids of up to `limit` PENDING items ordered by
    /// `(priority DESC, enqueued_at ASC)`, optionally restricted to a topic.
    async fn list_pending(&self, limit: i64, topic_id: Option<Uuid>) -> Result<Vec<Uuid>>;

    /// Transition to PROCESSING, bump `attempts`, stamp `picked_at`.
    /// Returns the refreshed item, or `None` when the item is already DONE.
    async fn begin_processing(&self, item_id: Uuid) -> Result<Option<FeedItem>>;

    /// Transition to DONE.
    async fn mark_done(&self, item_id: Uuid) -> Result<()>;

    /// Transition to FAILED with the reason recorded. Used for terminal
    /// failures (quality gates, missing agent, exhausted retries).
    async fn mark_failed(&self, item_id: Uuid, reason: &str) -> Result<()>;

    /// Return the item to PENDING with the error recorded, so the next
    /// batch scan retries it.
    async fn return_pending(&self, item_id: Uuid, error: &str) -> Result<()>;

    /// Flip PROCESSING items picked more than `older_than_secs` ago back to
    /// PENDING. Returns the number requeued.
    async fn requeue_stalled(&self, older_than_secs: i64) -> Result<i64>;

    /// Status counts for operator reporting.
    async fn stats(&self) -> Result<FeedQueueStats>;
}

/// Agent memory persistence, keyed uniquely by the idempotency triple.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Whether a memory record exists for the triple.
    async fn exists(&self, topic_id: Uuid, content_id: Uuid, content_hash: &str) -> Result<bool>;

    /// Create the memory record, returning `None` when the triple already
    /// exists (another process won the race).
    async fn create(&self, memory: &NewAgentMemory) -> Result<Option<AgentMemory>>;
}

// =============================================================================
// EXTERNAL COLLABORATORS
// =============================================================================

/// Heuristic text analysis used by the content packer's fallback paths.
///
/// Implementations must tolerate arbitrary plain text and may return fewer
/// results than requested, but never error.
pub trait TextAnalyzer: Send + Sync {
    fn extract_key_points(&self, text: &str, max_count: usize) -> Vec<String>;
    fn extract_entities(&self, text: &str) -> Vec<Entity>;
    fn extract_timeline(&self, text: &str) -> Vec<TimelineEntry>;
}

/// Analyzer that extracts nothing. Useful for tests and for deployments
/// that only pass through pre-extracted structure.
pub struct NullAnalyzer;

impl TextAnalyzer for NullAnalyzer {
    fn extract_key_points(&self, _text: &str, _max_count: usize) -> Vec<String> {
        Vec::new()
    }

    fn extract_entities(&self, _text: &str) -> Vec<Entity> {
        Vec::new()
    }

    fn extract_timeline(&self, _text: &str) -> Vec<TimelineEntry> {
        Vec::new()
    }
}

/// Content record lookup, backed by the external relational store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// The raw content for `content_id`, if the record still exists.
    async fn get_content(&self, content_id: Uuid) -> Result<Option<crate::models::RawContent>>;
}

/// A topic-scoped agent that can ingest packed memories.
#[async_trait]
pub trait TopicAgent: Send + Sync {
    fn id(&self) -> Uuid;

    /// Feed a created memory to the agent's ingestion entrypoint.
    async fn ingest(&self, memory: &AgentMemory) -> Result<IngestOutcome>;
}

/// Directory of agents per topic.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Agents configured for the topic; empty means the topic has no
    /// ingestion target (a terminal condition for feed items).
    async fn agents_for_topic(&self, topic_id: Uuid) -> Result<Vec<Arc<dyn TopicAgent>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_analyzer_returns_nothing() {
        let analyzer = NullAnalyzer;
        assert!(analyzer.extract_key_points("some text", 5).is_empty());
        assert!(analyzer.extract_entities("some text").is_empty());
        assert!(analyzer.extract_timeline("some text").is_empty());
    }
}
