//! Feed queue worker: idempotent item processing and the polling loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use lookout_core::{
    defaults, AgentDirectory, BatchSummary, ContentStore, Error, FeedItem, FeedQueueRepository,
    FeedStatus, MemoryRepository, NewAgentMemory, ProcessOutcome, Result, TextAnalyzer,
};

use crate::gates::QualityGates;
use crate::packer::ContentPacker;

/// Configuration for the feed worker.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Whether to enable item processing.
    pub enabled: bool,
    /// Maximum number of concurrently processed items.
    pub max_concurrent: usize,
    /// PENDING items selected per batch scan.
    pub batch_size: i64,
    /// Retry budget per item.
    pub max_attempts: i32,
    /// Scan interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Minimum extracted-text gate in bytes.
    pub min_text_bytes: usize,
    /// Minimum relevance gate; zero disables it.
    pub min_relevance: f64,
    /// PROCESSING items older than this are requeued as stalled.
    pub stalled_after_secs: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent: defaults::FEED_MAX_CONCURRENT,
            batch_size: defaults::FEED_BATCH_SIZE,
            max_attempts: defaults::FEED_MAX_ATTEMPTS,
            poll_interval_ms: defaults::FEED_POLL_INTERVAL_MS,
            min_text_bytes: defaults::MIN_TEXT_BYTES,
            min_relevance: defaults::MIN_RELEVANCE_SCORE,
            stalled_after_secs: defaults::FEED_STALLED_AFTER_SECS,
        }
    }
}

impl FeedConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FEED_WORKER_ENABLED` | `true` | Enable/disable item processing |
    /// | `FEED_MAX_CONCURRENT` | `4` | Max concurrent items |
    /// | `FEED_BATCH_SIZE` | `10` | PENDING items per scan |
    /// | `FEED_MAX_ATTEMPTS` | `3` | Retry budget per item |
    /// | `FEED_POLL_INTERVAL_MS` | `2000` | Scan interval when idle |
    /// | `FEED_MIN_TEXT_BYTES` | `100` | Minimum extracted-text gate |
    /// | `FEED_MIN_RELEVANCE` | `0` | Relevance gate; 0 disables |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.enabled = std::env::var("FEED_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        if let Some(n) = std::env::var("FEED_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.max_concurrent = n.max(1);
        }

        if let Some(n) = std::env::var("FEED_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            config.batch_size = n.max(1);
        }

        if let Some(n) = std::env::var("FEED_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
        {
            config.max_attempts = n.max(1);
        }

        if let Some(n) = std::env::var("FEED_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.poll_interval_ms = n;
        }

        if let Some(n) = std::env::var("FEED_MIN_TEXT_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.min_text_bytes = n;
        }

        if let Some(n) = std::env::var("FEED_MIN_RELEVANCE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
        {
            config.min_relevance = n.max(0.0);
        }

        config
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, n: i64) -> Self {
        self.batch_size = n;
        self
    }

    /// Set maximum concurrent items.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set the retry budget.
    pub fn with_max_attempts(mut self, n: i32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the minimum text gate.
    pub fn with_min_text_bytes(mut self, bytes: usize) -> Self {
        self.min_text_bytes = bytes;
        self
    }

    /// Set the relevance gate.
    pub fn with_min_relevance(mut self, score: f64) -> Self {
        self.min_relevance = score;
        self
    }

    /// Enable or disable processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the feed worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Worker started.
    WorkerStarted,
    /// One item reached DONE.
    ItemDone { item_id: Uuid },
    /// One item failed; `terminal` means it will not be retried.
    ItemFailed {
        item_id: Uuid,
        error: String,
        terminal: bool,
    },
    /// A batch scan completed.
    BatchProcessed { summary: BatchSummary },
    /// Stalled PROCESSING items were returned to PENDING.
    StalledRequeued { count: i64 },
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Processes individual feed items. Cloneable so batch tasks can run on
/// their own handle.
#[derive(Clone)]
pub struct FeedProcessor {
    feed: Arc<dyn FeedQueueRepository>,
    memories: Arc<dyn MemoryRepository>,
    content: Arc<dyn ContentStore>,
    agents: Arc<dyn AgentDirectory>,
    packer: ContentPacker,
    config: FeedConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl FeedProcessor {
    pub fn new(
        feed: Arc<dyn FeedQueueRepository>,
        memories: Arc<dyn MemoryRepository>,
        content: Arc<dyn ContentStore>,
        agents: Arc<dyn AgentDirectory>,
        analyzer: Arc<dyn TextAnalyzer>,
        config: FeedConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            feed,
            memories,
            content,
            agents,
            packer: ContentPacker::new(analyzer),
            config,
            event_tx,
        }
    }

    fn gates(&self) -> QualityGates {
        QualityGates {
            min_text_bytes: self.config.min_text_bytes,
            min_relevance: self.config.min_relevance,
        }
    }

    /// Process one item through the full contract: idempotent
    /// short-circuits, quality gates, memory re-check, agent resolution,
    /// pack + create + ingest.
    ///
    /// Safe to invoke twice on the same item: the second call observes DONE
    /// or the pre-existing memory and exits without side effects.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn process_one(&self, item_id: Uuid) -> Result<ProcessOutcome> {
        let Some(item) = self.feed.get(item_id).await? else {
            return Err(Error::FeedItemNotFound(item_id));
        };

        match item.status {
            FeedStatus::Done => return Ok(ProcessOutcome::AlreadyDone),
            FeedStatus::Failed if item.attempts >= self.config.max_attempts => {
                return Ok(ProcessOutcome::Failed {
                    reason: item
                        .last_error
                        .unwrap_or_else(|| "retry budget exhausted".to_string()),
                    terminal: true,
                });
            }
            _ => {}
        }

        let Some(item) = self.feed.begin_processing(item_id).await? else {
            // Another worker finished it between the load and the claim.
            return Ok(ProcessOutcome::AlreadyDone);
        };

        match self.execute(&item).await {
            Ok(outcome) => {
                self.emit_outcome(item_id, &outcome);
                Ok(outcome)
            }
            Err(e) => {
                // Transient infrastructure failure: back to PENDING while
                // the retry budget lasts.
                let reason = e.to_string();
                let terminal = item.attempts >= self.config.max_attempts;
                if terminal {
                    self.feed.mark_failed(item_id, &reason).await?;
                } else {
                    self.feed.return_pending(item_id, &reason).await?;
                }
                warn!(
                    item_id = %item_id,
                    attempt = item.attempts,
                    error = %reason,
                    terminal,
                    "Feed item processing failed"
                );
                let outcome = ProcessOutcome::Failed { reason, terminal };
                self.emit_outcome(item_id, &outcome);
                Ok(outcome)
            }
        }
    }

    /// Gate, re-check, pack, create, ingest. `Ok(Failed)` outcomes are
    /// terminal (content disqualified); `Err` means transient.
    async fn execute(&self, item: &FeedItem) -> Result<ProcessOutcome> {
        let Some(content) = self.content.get_content(item.content_id).await? else {
            let reason = format!("content record {} not found", item.content_id);
            self.feed.mark_failed(item.id, &reason).await?;
            return Ok(ProcessOutcome::Failed {
                reason,
                terminal: true,
            });
        };

        if let Err(failure) = self.gates().evaluate(&content) {
            let reason = failure.to_string();
            self.feed.mark_failed(item.id, &reason).await?;
            return Ok(ProcessOutcome::Failed {
                reason,
                terminal: true,
            });
        }

        // Another process may have created the memory between enqueue and
        // now; its existence is proof of prior success.
        if self
            .memories
            .exists(item.topic_id, item.content_id, &item.content_hash)
            .await?
        {
            self.feed.mark_done(item.id).await?;
            return Ok(ProcessOutcome::AlreadyDone);
        }

        let agents = self.agents.agents_for_topic(item.topic_id).await?;
        let Some(agent) = agents.first() else {
            // Nothing to retry without external configuration change.
            let reason = format!("no agent configured for topic {}", item.topic_id);
            self.feed.mark_failed(item.id, &reason).await?;
            return Ok(ProcessOutcome::Failed {
                reason,
                terminal: true,
            });
        };

        let digest = self.packer.pack(&content);
        let memory_content = self.packer.compose_memory_content(&content, &digest);

        let new_memory = NewAgentMemory {
            topic_id: item.topic_id,
            content_id: item.content_id,
            content_hash: item.content_hash.clone(),
            agent_id: agent.id(),
            title: content.title.clone(),
            content: memory_content,
        };

        match self.memories.create(&new_memory).await? {
            Some(memory) => {
                let outcome = agent.ingest(&memory).await?;
                if !outcome.success {
                    return Err(Error::Feed(format!(
                        "agent ingestion failed: {}",
                        outcome.error.unwrap_or_else(|| "unknown error".to_string())
                    )));
                }
                debug!(
                    item_id = %item.id,
                    content_id = %item.content_id,
                    memories_created = outcome.memories_created.unwrap_or(1),
                    "Memory ingested"
                );
            }
            None => {
                // Lost the creation race; the memory exists, which is success.
                debug!(item_id = %item.id, "Memory already created by another worker");
            }
        }

        self.feed.mark_done(item.id).await?;
        Ok(ProcessOutcome::Done)
    }

    /// Process up to `limit` PENDING items ordered by
    /// `(priority DESC, enqueued_at ASC)`, with bounded concurrency.
    /// One item's failure never aborts the batch.
    pub async fn process_batch(
        &self,
        limit: i64,
        topic_id: Option<Uuid>,
    ) -> Result<BatchSummary> {
        let start = Instant::now();
        let ids = self.feed.list_pending(limit, topic_id).await?;
        let mut summary = BatchSummary::default();

        for chunk in ids.chunks(self.config.max_concurrent.max(1)) {
            let mut tasks = JoinSet::new();
            for &id in chunk {
                let processor = self.clone();
                tasks.spawn(async move { (id, processor.process_one(id).await) });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Ok(ProcessOutcome::Done))) => summary.processed += 1,
                    Ok((_, Ok(ProcessOutcome::AlreadyDone))) => summary.skipped += 1,
                    Ok((_, Ok(ProcessOutcome::Failed { .. }))) => summary.failed += 1,
                    Ok((id, Err(e))) => {
                        summary.failed += 1;
                        error!(item_id = %id, error = %e, "Feed item processing errored");
                    }
                    Err(e) => {
                        summary.failed += 1;
                        error!(error = ?e, "Feed item task panicked");
                    }
                }
            }
        }

        if summary != BatchSummary::default() {
            info!(
                processed = summary.processed,
                failed = summary.failed,
                skipped = summary.skipped,
                duration_ms = start.elapsed().as_millis() as u64,
                "Feed batch complete"
            );
        }
        Ok(summary)
    }

    fn emit_outcome(&self, item_id: Uuid, outcome: &ProcessOutcome) {
        let event = match outcome {
            ProcessOutcome::Done => WorkerEvent::ItemDone { item_id },
            ProcessOutcome::AlreadyDone => return,
            ProcessOutcome::Failed { reason, terminal } => WorkerEvent::ItemFailed {
                item_id,
                error: reason.clone(),
                terminal: *terminal,
            },
        };
        let _ = self.event_tx.send(event);
    }
}

/// Feed worker that scans the queue on an interval.
pub struct FeedWorker {
    processor: FeedProcessor,
    config: FeedConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl FeedWorker {
    pub fn new(processor: FeedProcessor) -> Self {
        let config = processor.config.clone();
        let event_tx = processor.event_tx.clone();
        Self {
            processor,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the scan loop. Only sleeps when a scan found nothing to do, so a
    /// busy queue drains at full speed while an idle one costs one query per
    /// interval.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Feed worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent,
            batch_size = self.config.batch_size,
            "Feed worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Feed worker received shutdown signal");
                break;
            }

            // Housekeeping: stalled PROCESSING items are retryable.
            match self
                .processor
                .feed
                .requeue_stalled(self.config.stalled_after_secs)
                .await
            {
                Ok(count) if count > 0 => {
                    warn!(count, "Requeued stalled feed items");
                    let _ = self.event_tx.send(WorkerEvent::StalledRequeued { count });
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Failed to requeue stalled items"),
            }

            let summary = match self
                .processor
                .process_batch(self.config.batch_size, None)
                .await
            {
                Ok(summary) => summary,
                Err(e) => {
                    error!(error = %e, "Feed batch scan failed");
                    BatchSummary::default()
                }
            };
            let _ = self
                .event_tx
                .send(WorkerEvent::BatchProcessed { summary });

            let worked = summary.processed + summary.failed + summary.skipped;
            if worked == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Feed worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Feed worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_config_default() {
        let config = FeedConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.min_text_bytes, 100);
        assert_eq!(config.min_relevance, 0.0);
    }

    #[test]
    fn test_feed_config_builder() {
        let config = FeedConfig::default()
            .with_batch_size(25)
            .with_max_concurrent(8)
            .with_max_attempts(5)
            .with_poll_interval(100)
            .with_min_text_bytes(50)
            .with_min_relevance(0.4)
            .with_enabled(false);

        assert_eq!(config.batch_size, 25);
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.min_text_bytes, 50);
        assert_eq!(config.min_relevance, 0.4);
        assert!(!config.enabled);
    }
}
