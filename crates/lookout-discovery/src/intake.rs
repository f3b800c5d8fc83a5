//! Candidate intake — the accept/reject path between a frontier pop and the
//! feed queue.
//!
//! A discovery worker pops a frontier item, fetches it (externally), and
//! hands the outcome here: `screen` applies the seen-URL and near-duplicate
//! checks, `accept` performs the acceptance bookkeeping in one place (seen
//! mark, fingerprint, counters, feed enqueue, audit), and `record_fetch`
//! folds the fetch outcome into the host's reliability score.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use lookout_core::{
    defaults, simhash64, AuditEvent, AuditTrail, DedupRepository, EnqueueOutcome,
    FeedQueueRepository, HostReliability, HostReliabilityRepository, RejectReason, Result,
    SaveCounterRepository, SaveKind, TopicScope,
};

use crate::reliability::{unreliable_hosts, update_ema};

/// Tunables for the discovery side, read from the environment.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Seen-URL TTL in days.
    pub seen_ttl_days: i64,
    /// Near-duplicate Hamming threshold in bits.
    pub hamming_threshold: u32,
    /// Audit trail capacity per scope.
    pub audit_cap: i64,
    /// EMA smoothing factor for host reliability.
    pub ema_alpha: f64,
    /// Hosts below this EMA are reported as unreliable.
    pub unreliable_below: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            seen_ttl_days: defaults::SEEN_TTL_DAYS,
            hamming_threshold: defaults::HAMMING_THRESHOLD,
            audit_cap: defaults::AUDIT_CAP,
            ema_alpha: defaults::HOST_EMA_ALPHA,
            unreliable_below: defaults::HOST_UNRELIABLE_BELOW,
        }
    }
}

impl DiscoveryConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DISCOVERY_SEEN_TTL_DAYS` | `30` | Seen-URL expiry |
    /// | `DISCOVERY_HAMMING_THRESHOLD` | `7` | Near-dup bit distance |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(days) = std::env::var("DISCOVERY_SEEN_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            config.seen_ttl_days = days.max(1);
        }

        if let Some(bits) = std::env::var("DISCOVERY_HAMMING_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            config.hamming_threshold = bits.min(63);
        }

        config
    }

    /// Set the Hamming threshold.
    pub fn with_hamming_threshold(mut self, bits: u32) -> Self {
        self.hamming_threshold = bits;
        self
    }

    /// Set the seen-URL TTL.
    pub fn with_seen_ttl_days(mut self, days: i64) -> Self {
        self.seen_ttl_days = days;
        self
    }
}

/// Outcome of screening a fetched candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeDecision {
    /// The URL was already processed within the TTL.
    AlreadySeen,
    /// The content fingerprint is within the Hamming threshold of a recent
    /// fingerprint.
    NearDuplicate,
    /// New content; carry this fingerprint into [`CandidateIntake::accept`].
    Fresh { fingerprint: u64 },
}

/// Everything `accept` needs to record one accepted candidate.
#[derive(Debug, Clone)]
pub struct Acceptance {
    pub url: String,
    pub fingerprint: u64,
    pub content_id: Uuid,
    pub content_hash: String,
    pub priority: i32,
    /// Category counter to bump alongside the total, if any.
    pub kind: Option<SaveKind>,
}

/// The accept/reject decision path for discovered candidates.
pub struct CandidateIntake {
    dedup: Arc<dyn DedupRepository>,
    hosts: Arc<dyn HostReliabilityRepository>,
    counters: Arc<dyn SaveCounterRepository>,
    feed: Arc<dyn FeedQueueRepository>,
    audit: Arc<dyn AuditTrail>,
    config: DiscoveryConfig,
}

impl CandidateIntake {
    pub fn new(
        dedup: Arc<dyn DedupRepository>,
        hosts: Arc<dyn HostReliabilityRepository>,
        counters: Arc<dyn SaveCounterRepository>,
        feed: Arc<dyn FeedQueueRepository>,
        audit: Arc<dyn AuditTrail>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            dedup,
            hosts,
            counters,
            feed,
            audit,
            config,
        }
    }

    /// Screen a fetched candidate before any expensive downstream work.
    ///
    /// Rejections are recorded in the audit trail; the caller should simply
    /// drop the candidate. Both checks are advisory — a false positive costs
    /// one candidate, a false negative costs some noise.
    pub async fn screen(
        &self,
        scope: &TopicScope,
        url: &str,
        text: &str,
    ) -> Result<IntakeDecision> {
        if self.dedup.is_seen(scope, url).await? {
            debug!(topic_id = %scope.topic_id, url, "Candidate rejected: already seen");
            self.audit_reject(scope, url, RejectReason::AlreadySeen)
                .await?;
            return Ok(IntakeDecision::AlreadySeen);
        }

        let fingerprint = simhash64(text);
        if self
            .dedup
            .is_near_duplicate(scope, fingerprint, self.config.hamming_threshold)
            .await?
        {
            debug!(topic_id = %scope.topic_id, url, "Candidate rejected: near-duplicate");
            self.audit_reject(scope, url, RejectReason::NearDuplicate)
                .await?;
            return Ok(IntakeDecision::NearDuplicate);
        }

        Ok(IntakeDecision::Fresh { fingerprint })
    }

    /// Record an accepted candidate: mark it seen, store its fingerprint,
    /// bump the save counters, enqueue the feed item, and audit the decision.
    pub async fn accept(
        &self,
        scope: &TopicScope,
        acceptance: Acceptance,
    ) -> Result<EnqueueOutcome> {
        self.dedup
            .mark_seen(scope, &acceptance.url, self.config.seen_ttl_days)
            .await?;
        self.dedup
            .mark_fingerprint(scope, acceptance.fingerprint)
            .await?;
        self.counters.increment(scope, acceptance.kind).await?;

        let outcome = self
            .feed
            .enqueue(
                scope.topic_id,
                acceptance.content_id,
                &acceptance.content_hash,
                acceptance.priority,
            )
            .await?;

        self.audit
            .append(
                scope,
                &AuditEvent::CandidateAccepted {
                    url: acceptance.url.clone(),
                    content_id: acceptance.content_id,
                    content_hash: acceptance.content_hash.clone(),
                    priority: acceptance.priority,
                },
                self.config.audit_cap,
            )
            .await?;

        if matches!(outcome, EnqueueOutcome::Enqueued(_)) {
            self.audit
                .append(
                    scope,
                    &AuditEvent::FeedEnqueued {
                        content_id: acceptance.content_id,
                    },
                    self.config.audit_cap,
                )
                .await?;
        }

        info!(
            topic_id = %scope.topic_id,
            content_id = %acceptance.content_id,
            url = %acceptance.url,
            "Candidate accepted"
        );
        Ok(outcome)
    }

    /// Fold a fetch outcome into the host's reliability EMA and audit it.
    /// Returns the updated score.
    pub async fn record_fetch(
        &self,
        scope: &TopicScope,
        host: &str,
        success: bool,
    ) -> Result<f64> {
        let scores = self.hosts.get_all(scope).await?;
        let previous = scores.get(host).map(|r| r.ema);
        let ema = update_ema(previous, success, self.config.ema_alpha);

        self.hosts
            .set(
                scope,
                host,
                HostReliability {
                    ema,
                    updated_at: Utc::now(),
                },
            )
            .await?;

        self.audit
            .append(
                scope,
                &AuditEvent::FetchOutcome {
                    host: host.to_string(),
                    success,
                    ema,
                },
                self.config.audit_cap,
            )
            .await?;

        Ok(ema)
    }

    /// Hosts currently below the unreliable threshold, worst first.
    pub async fn unreliable_hosts(&self, scope: &TopicScope) -> Result<Vec<String>> {
        let scores = self.hosts.get_all(scope).await?;
        Ok(unreliable_hosts(&scores, self.config.unreliable_below))
    }

    async fn audit_reject(
        &self,
        scope: &TopicScope,
        url: &str,
        reason: RejectReason,
    ) -> Result<()> {
        self.audit
            .append(
                scope,
                &AuditEvent::CandidateRejected {
                    url: url.to_string(),
                    reason,
                },
                self.config.audit_cap,
            )
            .await
    }
}
