//! In-memory implementations of the storage traits.
//!
//! [`MemStore`] backs unit tests and embedded experimentation without a
//! database. It honors the same contracts as the PostgreSQL layer: capacity
//! eviction, window trimming, TTL expiry, idempotent enqueue, and the
//! lease/mode double-write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::defaults;
use crate::error::Result;
use crate::models::{
    AgentMemory, AuditEvent, AuditPage, AuditRecord, EnqueueOutcome, FeedItem, FeedQueueStats,
    FeedStatus, FrontierItem, HostReliability, NewAgentMemory, RunMode, SaveCounters, SaveKind,
    ZeroYieldDiagnostic,
};
use crate::scope::TopicScope;
use crate::simhash::hamming_distance;
use crate::traits::{
    AuditTrail, DedupRepository, DiagnosticsRepository, FeedQueueRepository, FrontierRepository,
    HostReliabilityRepository, MemoryRepository, RunRegistry, SaveCounterRepository,
};

#[derive(Default)]
struct Inner {
    frontier: HashMap<TopicScope, Vec<(u64, FrontierItem)>>,
    seen: HashMap<TopicScope, HashMap<String, DateTime<Utc>>>,
    fingerprints: HashMap<TopicScope, Vec<u64>>,
    hosts: HashMap<TopicScope, (HashMap<String, HostReliability>, DateTime<Utc>)>,
    lease: HashMap<TopicScope, (Uuid, DateTime<Utc>)>,
    mode: HashMap<TopicScope, RunMode>,
    audit: HashMap<TopicScope, Vec<String>>,
    diagnostics: HashMap<TopicScope, (ZeroYieldDiagnostic, DateTime<Utc>)>,
    counters: HashMap<TopicScope, (SaveCounters, DateTime<Utc>)>,
    feed: HashMap<Uuid, FeedItem>,
    memories: HashMap<(Uuid, Uuid, String), AgentMemory>,
}

/// Shared in-memory store implementing every storage trait.
#[derive(Clone)]
pub struct MemStore {
    inner: Arc<Mutex<Inner>>,
    seq: Arc<AtomicU64>,
    frontier_capacity: usize,
    fingerprint_window: usize,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            seq: Arc::new(AtomicU64::new(0)),
            frontier_capacity: defaults::FRONTIER_CAPACITY as usize,
            fingerprint_window: defaults::FINGERPRINT_WINDOW as usize,
        }
    }

    pub fn with_frontier_capacity(mut self, capacity: usize) -> Self {
        self.frontier_capacity = capacity;
        self
    }

    pub fn with_fingerprint_window(mut self, window: usize) -> Self {
        self.fingerprint_window = window;
        self
    }

    /// Store a raw, possibly malformed audit payload (for degrade tests).
    pub fn inject_raw_audit(&self, scope: &TopicScope, raw: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .audit
            .entry(*scope)
            .or_default()
            .insert(0, raw.to_string());
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl FrontierRepository for MemStore {
    async fn push(&self, scope: &TopicScope, item: &FrontierItem) -> Result<()> {
        let seq = self.next_seq();
        let mut inner = self.inner.lock().unwrap();
        let queue = inner.frontier.entry(*scope).or_default();
        queue.push((seq, item.clone()));
        // Highest priority first, insertion order breaking ties; evict the tail.
        queue.sort_by(|(sa, a), (sb, b)| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(sa.cmp(sb))
        });
        queue.truncate(self.frontier_capacity);
        Ok(())
    }

    async fn pop(&self, scope: &TopicScope) -> Result<Option<FrontierItem>> {
        let mut inner = self.inner.lock().unwrap();
        let queue = inner.frontier.entry(*scope).or_default();
        if queue.is_empty() {
            Ok(None)
        } else {
            Ok(Some(queue.remove(0).1))
        }
    }

    async fn size(&self, scope: &TopicScope) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.frontier.get(scope).map(|q| q.len()).unwrap_or(0) as i64)
    }

    async fn clear(&self, scope: &TopicScope) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.frontier.remove(scope);
        Ok(())
    }
}

#[async_trait]
impl DedupRepository for MemStore {
    async fn is_seen(&self, scope: &TopicScope, url: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .seen
            .get(scope)
            .and_then(|urls| urls.get(url))
            .map(|expires| *expires > Utc::now())
            .unwrap_or(false))
    }

    async fn mark_seen(&self, scope: &TopicScope, url: &str, ttl_days: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .seen
            .entry(*scope)
            .or_default()
            .insert(url.to_string(), Utc::now() + Duration::days(ttl_days));
        Ok(())
    }

    async fn is_near_duplicate(
        &self,
        scope: &TopicScope,
        fingerprint: u64,
        threshold: u32,
    ) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .fingerprints
            .get(scope)
            .map(|window| {
                window
                    .iter()
                    .any(|f| hamming_distance(*f, fingerprint) <= threshold)
            })
            .unwrap_or(false))
    }

    async fn mark_fingerprint(&self, scope: &TopicScope, fingerprint: u64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let window = inner.fingerprints.entry(*scope).or_default();
        window.push(fingerprint);
        let excess = window.len().saturating_sub(self.fingerprint_window);
        if excess > 0 {
            window.drain(..excess);
        }
        Ok(())
    }
}

#[async_trait]
impl HostReliabilityRepository for MemStore {
    async fn get_all(&self, scope: &TopicScope) -> Result<HashMap<String, HostReliability>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .hosts
            .get(scope)
            .filter(|(_, expires)| *expires > Utc::now())
            .map(|(map, _)| map.clone())
            .unwrap_or_default())
    }

    async fn set(&self, scope: &TopicScope, host: &str, value: HostReliability) -> Result<()> {
        let expires = Utc::now() + Duration::days(defaults::HOST_RELIABILITY_TTL_DAYS);
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .hosts
            .entry(*scope)
            .or_insert_with(|| (HashMap::new(), expires));
        entry.0.insert(host.to_string(), value);
        entry.1 = expires;
        Ok(())
    }
}

#[async_trait]
impl RunRegistry for MemStore {
    async fn set_active_run(&self, scope: &TopicScope, run_id: Uuid, ttl_secs: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .lease
            .insert(*scope, (run_id, Utc::now() + Duration::seconds(ttl_secs)));
        inner.mode.insert(*scope, RunMode::Live);
        Ok(())
    }

    async fn get_active_run(&self, scope: &TopicScope) -> Result<Option<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .lease
            .get(scope)
            .filter(|(_, expires)| *expires > Utc::now())
            .map(|(run_id, _)| *run_id))
    }

    async fn clear_active_run(&self, scope: &TopicScope) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.lease.remove(scope);
        inner.mode.remove(scope);
        Ok(())
    }

    async fn set_run_state(&self, scope: &TopicScope, mode: RunMode) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.mode.insert(*scope, mode);
        Ok(())
    }

    async fn get_run_state(&self, scope: &TopicScope) -> Result<Option<RunMode>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.mode.get(scope).copied())
    }
}

#[async_trait]
impl AuditTrail for MemStore {
    async fn append(&self, scope: &TopicScope, event: &AuditEvent, cap: i64) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut inner = self.inner.lock().unwrap();
        let log = inner.audit.entry(*scope).or_default();
        log.insert(0, payload);
        log.truncate(cap as usize);
        Ok(())
    }

    async fn page(&self, scope: &TopicScope, offset: i64, limit: i64) -> Result<AuditPage> {
        let inner = self.inner.lock().unwrap();
        let log = inner.audit.get(scope).cloned().unwrap_or_default();
        let total = log.len() as i64;
        let items: Vec<AuditRecord> = log
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
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

#[async_trait]
impl DiagnosticsRepository for MemStore {
    async fn set(&self, scope: &TopicScope, diagnostic: &ZeroYieldDiagnostic) -> Result<()> {
        let expires = Utc::now() + Duration::seconds(defaults::DIAGNOSTIC_TTL_SECS);
        let mut inner = self.inner.lock().unwrap();
        inner
            .diagnostics
            .insert(*scope, (diagnostic.clone(), expires));
        Ok(())
    }

    async fn get(&self, scope: &TopicScope) -> Result<Option<ZeroYieldDiagnostic>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .diagnostics
            .get(scope)
            .filter(|(_, expires)| *expires > Utc::now())
            .map(|(diag, _)| diag.clone()))
    }

    async fn clear(&self, scope: &TopicScope) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.diagnostics.remove(scope);
        Ok(())
    }
}

#[async_trait]
impl SaveCounterRepository for MemStore {
    async fn increment(&self, scope: &TopicScope, kind: Option<SaveKind>) -> Result<()> {
        let expires = Utc::now() + Duration::seconds(defaults::SAVE_COUNTER_TTL_SECS);
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .counters
            .entry(*scope)
            .or_insert_with(|| (SaveCounters::default(), expires));
        if entry.1 <= Utc::now() {
            entry.0 = SaveCounters::default();
        }
        entry.0.total += 1;
        match kind {
            Some(SaveKind::Controversy) => entry.0.controversy += 1,
            Some(SaveKind::History) => entry.0.history += 1,
            None => {}
        }
        entry.1 = expires;
        Ok(())
    }

    async fn get(&self, scope: &TopicScope) -> Result<SaveCounters> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .counters
            .get(scope)
            .filter(|(_, expires)| *expires > Utc::now())
            .map(|(counters, _)| *counters)
            .unwrap_or_default())
    }
}

#[async_trait]
impl FeedQueueRepository for MemStore {
    async fn enqueue(
        &self,
        topic_id: Uuid,
        content_id: Uuid,
        content_hash: &str,
        priority: i32,
    ) -> Result<EnqueueOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .memories
            .contains_key(&(topic_id, content_id, content_hash.to_string()))
        {
            return Ok(EnqueueOutcome::AlreadyProcessed);
        }
        let exists = inner.feed.values().any(|item| {
            item.topic_id == topic_id
                && item.content_id == content_id
                && item.content_hash == content_hash
        });
        if exists {
            return Ok(EnqueueOutcome::AlreadyEnqueued);
        }
        let id = Uuid::now_v7();
        inner.feed.insert(
            id,
            FeedItem {
                id,
                topic_id,
                content_id,
                content_hash: content_hash.to_string(),
                priority,
                status: FeedStatus::Pending,
                attempts: 0,
                last_error: None,
                enqueued_at: Utc::now(),
                picked_at: None,
            },
        );
        Ok(EnqueueOutcome::Enqueued(id))
    }

    async fn get(&self, item_id: Uuid) -> Result<Option<FeedItem>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.feed.get(&item_id).cloned())
    }

    async fn list_pending(&self, limit: i64, topic_id: Option<Uuid>) -> Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        let mut pending: Vec<&FeedItem> = inner
            .feed
            .values()
            .filter(|item| item.status == FeedStatus::Pending)
            .filter(|item| topic_id.map(|t| item.topic_id == t).unwrap_or(true))
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.enqueued_at.cmp(&b.enqueued_at))
        });
        Ok(pending
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|item| item.id)
            .collect())
    }

    async fn begin_processing(&self, item_id: Uuid) -> Result<Option<FeedItem>> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.feed.get_mut(&item_id).and_then(|item| {
            if item.status == FeedStatus::Done {
                None
            } else {
                item.status = FeedStatus::Processing;
                item.attempts += 1;
                item.picked_at = Some(Utc::now());
                Some(item.clone())
            }
        }))
    }

    async fn mark_done(&self, item_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(item) = inner.feed.get_mut(&item_id) {
            item.status = FeedStatus::Done;
            item.last_error = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, item_id: Uuid, reason: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(item) = inner.feed.get_mut(&item_id) {
            item.status = FeedStatus::Failed;
            item.last_error = Some(reason.to_string());
        }
        Ok(())
    }

    async fn return_pending(&self, item_id: Uuid, error: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(item) = inner.feed.get_mut(&item_id) {
            item.status = FeedStatus::Pending;
            item.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn requeue_stalled(&self, older_than_secs: i64) -> Result<i64> {
        let cutoff = Utc::now() - Duration::seconds(older_than_secs);
        let mut inner = self.inner.lock().unwrap();
        let mut requeued = 0;
        for item in inner.feed.values_mut() {
            if item.status == FeedStatus::Processing
                && item.picked_at.map(|t| t < cutoff).unwrap_or(false)
            {
                item.status = FeedStatus::Pending;
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn stats(&self) -> Result<FeedQueueStats> {
        let inner = self.inner.lock().unwrap();
        let count =
            |status: FeedStatus| inner.feed.values().filter(|i| i.status == status).count() as i64;
        Ok(FeedQueueStats {
            pending: count(FeedStatus::Pending),
            processing: count(FeedStatus::Processing),
            done: count(FeedStatus::Done),
            failed: count(FeedStatus::Failed),
            total: inner.feed.len() as i64,
        })
    }
}

#[async_trait]
impl MemoryRepository for MemStore {
    async fn exists(&self, topic_id: Uuid, content_id: Uuid, content_hash: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .memories
            .contains_key(&(topic_id, content_id, content_hash.to_string())))
    }

    async fn create(&self, memory: &NewAgentMemory) -> Result<Option<AgentMemory>> {
        let mut inner = self.inner.lock().unwrap();
        let key = (
            memory.topic_id,
            memory.content_id,
            memory.content_hash.clone(),
        );
        if inner.memories.contains_key(&key) {
            return Ok(None);
        }
        let record = AgentMemory {
            id: Uuid::now_v7(),
            topic_id: memory.topic_id,
            content_id: memory.content_id,
            content_hash: memory.content_hash.clone(),
            agent_id: memory.agent_id,
            title: memory.title.clone(),
            content: memory.content.clone(),
            created_at: Utc::now(),
        };
        inner.memories.insert(key, record.clone());
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, priority: f64) -> FrontierItem {
        FrontierItem {
            id: id.to_string(),
            provider: "web_search".to_string(),
            cursor: String::new(),
            priority,
            angle: None,
            meta: None,
            payload: None,
        }
    }

    #[tokio::test]
    async fn frontier_pops_in_priority_order() {
        let store = MemStore::new();
        let scope = TopicScope::live(Uuid::new_v4());
        for (id, priority) in [("a", 0.2), ("b", 0.9), ("c", 0.5)] {
            store.push(&scope, &item(id, priority)).await.unwrap();
        }
        let order: Vec<String> = [
            store.pop(&scope).await.unwrap().unwrap().id,
            store.pop(&scope).await.unwrap().unwrap().id,
            store.pop(&scope).await.unwrap().unwrap().id,
        ]
        .to_vec();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert!(store.pop(&scope).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn frontier_capacity_evicts_lowest() {
        let store = MemStore::new().with_frontier_capacity(2);
        let scope = TopicScope::live(Uuid::new_v4());
        store.push(&scope, &item("low", 0.1)).await.unwrap();
        store.push(&scope, &item("mid", 0.5)).await.unwrap();
        store.push(&scope, &item("high", 0.9)).await.unwrap();
        assert_eq!(store.size(&scope).await.unwrap(), 2);
        assert_eq!(store.pop(&scope).await.unwrap().unwrap().id, "high");
        assert_eq!(store.pop(&scope).await.unwrap().unwrap().id, "mid");
    }

    #[tokio::test]
    async fn fingerprint_window_trims_oldest() {
        let store = MemStore::new().with_fingerprint_window(3);
        let scope = TopicScope::live(Uuid::new_v4());
        for f in [1u64, 2, 3, 4] {
            store.mark_fingerprint(&scope, f).await.unwrap();
        }
        // Fingerprint 1 fell out of the window.
        assert!(!store.is_near_duplicate(&scope, 1, 0).await.unwrap());
        assert!(store.is_near_duplicate(&scope, 4, 0).await.unwrap());
    }

    #[tokio::test]
    async fn lease_and_mode_move_together() {
        let store = MemStore::new();
        let scope = TopicScope::live(Uuid::new_v4());
        let run_id = Uuid::new_v4();

        store.set_active_run(&scope, run_id, 3600).await.unwrap();
        assert_eq!(store.get_active_run(&scope).await.unwrap(), Some(run_id));
        assert_eq!(
            store.get_run_state(&scope).await.unwrap(),
            Some(RunMode::Live)
        );

        store.clear_active_run(&scope).await.unwrap();
        assert_eq!(store.get_active_run(&scope).await.unwrap(), None);
        assert_eq!(store.get_run_state(&scope).await.unwrap(), None);
    }

    #[tokio::test]
    async fn enqueue_is_idempotent() {
        let store = MemStore::new();
        let (topic, content) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store.enqueue(topic, content, "h1", 0).await.unwrap();
        assert!(matches!(first, EnqueueOutcome::Enqueued(_)));
        let second = store.enqueue(topic, content, "h1", 0).await.unwrap();
        assert_eq!(second, EnqueueOutcome::AlreadyEnqueued);
    }

    #[tokio::test]
    async fn malformed_audit_rows_page_as_raw() {
        let store = MemStore::new();
        let scope = TopicScope::live(Uuid::new_v4());

        store
            .append(
                &scope,
                &AuditEvent::Opaque {
                    payload: serde_json::json!({"ok": true}),
                },
                100,
            )
            .await
            .unwrap();
        store.inject_raw_audit(&scope, "{corrupt");

        let page = store.page(&scope, 0, 10).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(matches!(&page.items[0], AuditRecord::Raw { raw } if raw == "{corrupt"));
        assert!(matches!(&page.items[1], AuditRecord::Event(_)));
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn shadow_scope_isolated_from_live() {
        let store = MemStore::new();
        let topic = Uuid::new_v4();
        let live = TopicScope::live(topic);
        let shadow = TopicScope::shadow(topic);

        store.mark_seen(&live, "https://x.example/a", 30).await.unwrap();
        assert!(store.is_seen(&live, "https://x.example/a").await.unwrap());
        assert!(!store.is_seen(&shadow, "https://x.example/a").await.unwrap());
    }
}
