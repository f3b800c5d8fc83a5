//! Feed worker tests against the in-memory store.
//!
//! These exercise the full processing contract without a database:
//! idempotent enqueue/process, quality gates, retry budget, priority
//! ordering, failure isolation, and the worker loop lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use lookout_core::{
    AgentDirectory, AgentMemory, ContentStore, EnqueueOutcome, Error, FeedQueueRepository,
    FeedStatus, IngestOutcome, MemStore, MemoryRepository, NullAnalyzer, ProcessOutcome,
    RawContent, Result, TopicAgent,
};
use lookout_feed::{FeedConfig, FeedProcessor, FeedWorker, WorkerEvent};

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// Content store over a shared map, optionally failing the first N reads.
#[derive(Clone, Default)]
struct MapContentStore {
    records: Arc<Mutex<HashMap<Uuid, RawContent>>>,
    failures_remaining: Arc<AtomicI32>,
}

impl MapContentStore {
    fn insert(&self, content: RawContent) {
        self.records
            .lock()
            .unwrap()
            .insert(content.content_id, content);
    }

    fn fail_next(&self, n: i32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for MapContentStore {
    async fn get_content(&self, content_id: Uuid) -> Result<Option<RawContent>> {
        if self.failures_remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
            return Err(Error::Internal("simulated store outage".to_string()));
        }
        Ok(self.records.lock().unwrap().get(&content_id).cloned())
    }
}

/// Agent that records every ingested memory.
#[derive(Clone)]
struct RecordingAgent {
    id: Uuid,
    ingested: Arc<Mutex<Vec<AgentMemory>>>,
}

impl RecordingAgent {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            ingested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn ingested_count(&self) -> usize {
        self.ingested.lock().unwrap().len()
    }
}

#[async_trait]
impl TopicAgent for RecordingAgent {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn ingest(&self, memory: &AgentMemory) -> Result<IngestOutcome> {
        self.ingested.lock().unwrap().push(memory.clone());
        Ok(IngestOutcome {
            success: true,
            memories_created: Some(1),
            error: None,
        })
    }
}

/// Directory serving a fixed agent list for every topic.
struct FixedDirectory {
    agents: Vec<Arc<dyn TopicAgent>>,
}

#[async_trait]
impl AgentDirectory for FixedDirectory {
    async fn agents_for_topic(&self, _topic_id: Uuid) -> Result<Vec<Arc<dyn TopicAgent>>> {
        Ok(self.agents.clone())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

struct Harness {
    store: MemStore,
    content: MapContentStore,
    agent: RecordingAgent,
    processor: FeedProcessor,
}

fn harness_with_config(config: FeedConfig) -> Harness {
    let store = MemStore::new();
    let content = MapContentStore::default();
    let agent = RecordingAgent::new();
    let processor = FeedProcessor::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(content.clone()),
        Arc::new(FixedDirectory {
            agents: vec![Arc::new(agent.clone())],
        }),
        Arc::new(NullAnalyzer),
        config,
    );
    Harness {
        store,
        content,
        agent,
        processor,
    }
}

fn harness() -> Harness {
    harness_with_config(FeedConfig::default())
}

fn long_text() -> String {
    "The council approved the measure after extended debate. ".repeat(10)
}

fn content_record(topic_id: Uuid, text: &str) -> RawContent {
    RawContent {
        content_id: Uuid::new_v4(),
        topic_id,
        title: "Test content".to_string(),
        url: Some("https://news.example/item".to_string()),
        full_text: text.to_string(),
        summary: None,
        why_it_matters: None,
        facts: Vec::new(),
        entities: Vec::new(),
        timeline: Vec::new(),
        relevance_score: Some(0.9),
    }
}

async fn enqueue(harness: &Harness, content: &RawContent, priority: i32) -> Uuid {
    harness.content.insert(content.clone());
    match harness
        .store
        .enqueue(
            content.topic_id,
            content.content_id,
            "hash-1",
            priority,
        )
        .await
        .unwrap()
    {
        EnqueueOutcome::Enqueued(id) => id,
        other => panic!("Expected fresh enqueue, got {other:?}"),
    }
}

// ============================================================================
// PROCESSING CONTRACT
// ============================================================================

#[tokio::test]
async fn process_one_creates_memory_and_marks_done() {
    let harness = harness();
    let topic = Uuid::new_v4();
    let content = content_record(topic, &long_text());
    let item_id = enqueue(&harness, &content, 0).await;

    let outcome = harness.processor.process_one(item_id).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Done);

    let item = FeedQueueRepository::get(&harness.store, item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, FeedStatus::Done);
    assert_eq!(item.attempts, 1);
    assert!(item.picked_at.is_some());

    assert!(harness
        .store
        .exists(topic, content.content_id, "hash-1")
        .await
        .unwrap());
    assert_eq!(harness.agent.ingested_count(), 1);
}

#[tokio::test]
async fn process_one_is_idempotent() {
    let harness = harness();
    let topic = Uuid::new_v4();
    let content = content_record(topic, &long_text());
    let item_id = enqueue(&harness, &content, 0).await;

    assert_eq!(
        harness.processor.process_one(item_id).await.unwrap(),
        ProcessOutcome::Done
    );
    // Second call short-circuits without touching the agent again.
    assert_eq!(
        harness.processor.process_one(item_id).await.unwrap(),
        ProcessOutcome::AlreadyDone
    );
    assert_eq!(harness.agent.ingested_count(), 1);

    // Re-enqueuing the processed triple is a no-op too.
    let outcome = harness
        .store
        .enqueue(topic, content.content_id, "hash-1", 0)
        .await
        .unwrap();
    assert_eq!(outcome, EnqueueOutcome::AlreadyProcessed);
}

#[tokio::test]
async fn enqueue_twice_stores_one_item() {
    let harness = harness();
    let topic = Uuid::new_v4();
    let content = content_record(topic, &long_text());
    enqueue(&harness, &content, 0).await;

    let again = harness
        .store
        .enqueue(topic, content.content_id, "hash-1", 0)
        .await
        .unwrap();
    assert_eq!(again, EnqueueOutcome::AlreadyEnqueued);

    let stats = harness.store.stats().await.unwrap();
    assert_eq!(stats.total, 1);
}

#[tokio::test]
async fn short_text_fails_gate_terminally() {
    let harness = harness();
    let topic = Uuid::new_v4();
    let content = content_record(topic, "too short");
    let item_id = enqueue(&harness, &content, 0).await;

    let outcome = harness.processor.process_one(item_id).await.unwrap();
    match outcome {
        ProcessOutcome::Failed { reason, terminal } => {
            assert!(terminal);
            assert!(reason.contains("9 bytes"));
            assert!(reason.contains("100 bytes"));
        }
        other => panic!("Expected gate failure, got {other:?}"),
    }

    let item = FeedQueueRepository::get(&harness.store, item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, FeedStatus::Failed);
    assert!(item.last_error.unwrap().contains("too short"));
    assert_eq!(harness.agent.ingested_count(), 0);
}

#[tokio::test]
async fn relevance_gate_enforced_only_when_enabled() {
    let topic = Uuid::new_v4();

    // Disabled (default 0): low score passes.
    let harness = harness();
    let mut content = content_record(topic, &long_text());
    content.relevance_score = Some(0.01);
    let item_id = enqueue(&harness, &content, 0).await;
    assert_eq!(
        harness.processor.process_one(item_id).await.unwrap(),
        ProcessOutcome::Done
    );

    // Enabled: the same score is rejected.
    let harness = harness_with_config(FeedConfig::default().with_min_relevance(0.5));
    let mut content = content_record(topic, &long_text());
    content.relevance_score = Some(0.01);
    let item_id = enqueue(&harness, &content, 0).await;
    match harness.processor.process_one(item_id).await.unwrap() {
        ProcessOutcome::Failed { reason, terminal } => {
            assert!(terminal);
            assert!(reason.contains("relevance"));
        }
        other => panic!("Expected relevance failure, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_agent_is_terminal() {
    let store = MemStore::new();
    let content_store = MapContentStore::default();
    let processor = FeedProcessor::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(content_store.clone()),
        Arc::new(FixedDirectory { agents: Vec::new() }),
        Arc::new(NullAnalyzer),
        FeedConfig::default(),
    );

    let topic = Uuid::new_v4();
    let content = content_record(topic, &long_text());
    content_store.insert(content.clone());
    let EnqueueOutcome::Enqueued(item_id) = store
        .enqueue(topic, content.content_id, "hash-1", 0)
        .await
        .unwrap()
    else {
        panic!("enqueue failed");
    };

    match processor.process_one(item_id).await.unwrap() {
        ProcessOutcome::Failed { reason, terminal } => {
            assert!(terminal);
            assert!(reason.contains("no agent configured"));
        }
        other => panic!("Expected missing-agent failure, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_content_record_is_terminal() {
    let harness = harness();
    let topic = Uuid::new_v4();
    // Enqueue without inserting the content record.
    let EnqueueOutcome::Enqueued(item_id) = harness
        .store
        .enqueue(topic, Uuid::new_v4(), "hash-1", 0)
        .await
        .unwrap()
    else {
        panic!("enqueue failed");
    };

    match harness.processor.process_one(item_id).await.unwrap() {
        ProcessOutcome::Failed { reason, terminal } => {
            assert!(terminal);
            assert!(reason.contains("not found"));
        }
        other => panic!("Expected missing-content failure, got {other:?}"),
    }
}

// ============================================================================
// RETRY BUDGET
// ============================================================================

#[tokio::test]
async fn transient_failure_returns_to_pending_then_succeeds() {
    let harness = harness();
    let topic = Uuid::new_v4();
    let content = content_record(topic, &long_text());
    let item_id = enqueue(&harness, &content, 0).await;

    harness.content.fail_next(2);

    for expected_attempt in 1..=2 {
        match harness.processor.process_one(item_id).await.unwrap() {
            ProcessOutcome::Failed { terminal, .. } => assert!(!terminal),
            other => panic!("Expected transient failure, got {other:?}"),
        }
        let item = FeedQueueRepository::get(&harness.store, item_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, FeedStatus::Pending);
        assert_eq!(item.attempts, expected_attempt);
        assert!(item.last_error.unwrap().contains("outage"));
    }

    // Third attempt succeeds within the budget.
    assert_eq!(
        harness.processor.process_one(item_id).await.unwrap(),
        ProcessOutcome::Done
    );
}

#[tokio::test]
async fn exhausted_retries_end_failed() {
    let harness = harness();
    let topic = Uuid::new_v4();
    let content = content_record(topic, &long_text());
    let item_id = enqueue(&harness, &content, 0).await;

    harness.content.fail_next(10);

    for _ in 0..2 {
        match harness.processor.process_one(item_id).await.unwrap() {
            ProcessOutcome::Failed { terminal, .. } => assert!(!terminal),
            other => panic!("Expected transient failure, got {other:?}"),
        }
    }
    // Third failure exhausts the budget.
    match harness.processor.process_one(item_id).await.unwrap() {
        ProcessOutcome::Failed { terminal, .. } => assert!(terminal),
        other => panic!("Expected terminal failure, got {other:?}"),
    }

    let item = FeedQueueRepository::get(&harness.store, item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, FeedStatus::Failed);
    assert_eq!(item.attempts, 3);

    // A further call returns failure without processing again.
    match harness.processor.process_one(item_id).await.unwrap() {
        ProcessOutcome::Failed { terminal, .. } => assert!(terminal),
        other => panic!("Expected terminal failure, got {other:?}"),
    }
    let item = FeedQueueRepository::get(&harness.store, item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.attempts, 3);
}

// ============================================================================
// BATCH PROCESSING
// ============================================================================

#[tokio::test]
async fn batch_processes_highest_priority_first() {
    let harness = harness();
    let topic = Uuid::new_v4();

    let c1 = content_record(topic, &long_text());
    let c2 = content_record(topic, &long_text());
    harness.content.insert(c1.clone());
    harness.content.insert(c2.clone());

    let EnqueueOutcome::Enqueued(low) = harness
        .store
        .enqueue(topic, c2.content_id, "h2", 1)
        .await
        .unwrap()
    else {
        panic!()
    };
    let EnqueueOutcome::Enqueued(high) = harness
        .store
        .enqueue(topic, c1.content_id, "h1", 5)
        .await
        .unwrap()
    else {
        panic!()
    };

    let summary = harness.processor.process_batch(1, None).await.unwrap();
    assert_eq!(summary.processed, 1);

    let high_item = FeedQueueRepository::get(&harness.store, high)
        .await
        .unwrap()
        .unwrap();
    let low_item = FeedQueueRepository::get(&harness.store, low)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(high_item.status, FeedStatus::Done);
    assert_eq!(low_item.status, FeedStatus::Pending);
}

#[tokio::test]
async fn batch_isolates_failures() {
    let harness = harness();
    let topic = Uuid::new_v4();

    let good = content_record(topic, &long_text());
    let bad = content_record(topic, "tiny");
    harness.content.insert(good.clone());
    harness.content.insert(bad.clone());
    harness
        .store
        .enqueue(topic, good.content_id, "hg", 0)
        .await
        .unwrap();
    harness
        .store
        .enqueue(topic, bad.content_id, "hb", 0)
        .await
        .unwrap();

    let summary = harness.processor.process_batch(10, None).await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);

    let stats = harness.store.stats().await.unwrap();
    assert_eq!(stats.done, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn batch_scoped_to_topic() {
    let harness = harness();
    let topic_a = Uuid::new_v4();
    let topic_b = Uuid::new_v4();

    let ca = content_record(topic_a, &long_text());
    let cb = content_record(topic_b, &long_text());
    harness.content.insert(ca.clone());
    harness.content.insert(cb.clone());
    harness
        .store
        .enqueue(topic_a, ca.content_id, "ha", 0)
        .await
        .unwrap();
    harness
        .store
        .enqueue(topic_b, cb.content_id, "hb", 0)
        .await
        .unwrap();

    let summary = harness
        .processor
        .process_batch(10, Some(topic_a))
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);

    let stats = harness.store.stats().await.unwrap();
    assert_eq!(stats.pending, 1); // topic_b untouched
}

// ============================================================================
// WORKER LOOP
// ============================================================================

#[tokio::test]
async fn worker_loop_drains_queue_and_shuts_down() {
    let harness = harness_with_config(FeedConfig::default().with_poll_interval(20));
    let topic = Uuid::new_v4();
    let content = content_record(topic, &long_text());
    let item_id = enqueue(&harness, &content, 0).await;

    let worker = FeedWorker::new(harness.processor.clone());
    let mut events = worker.events();
    let handle = worker.start();

    // Wait for the item to be processed.
    let deadline = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(WorkerEvent::ItemDone { item_id: done }) if done == item_id => break,
                Ok(_) => continue,
                Err(e) => panic!("event stream closed: {e}"),
            }
        }
    })
    .await;
    assert!(deadline.is_ok(), "worker never processed the item");

    handle.shutdown().await.unwrap();

    let item = FeedQueueRepository::get(&harness.store, item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, FeedStatus::Done);
}
