//! Core domain models shared across the lookout crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// FRONTIER
// =============================================================================

/// A fetch candidate produced by the planner and held in the frontier queue.
///
/// The queue treats the payload as opaque; ordering by `priority` is its only
/// responsibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrontierItem {
    /// Planner-assigned identifier for the candidate.
    pub id: String,
    /// Which discovery provider produced the candidate.
    pub provider: String,
    /// Provider-specific continuation cursor.
    pub cursor: String,
    /// Scheduling priority; higher pops first.
    pub priority: f64,
    /// Optional investigation angle the planner attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
}

// =============================================================================
// HOST RELIABILITY
// =============================================================================

/// Recency-weighted success rate for a single source host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HostReliability {
    /// Exponential moving average of fetch success, in `[0, 1]`.
    pub ema: f64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// RUN LIFECYCLE
// =============================================================================

/// Operator-facing run mode, polled by workers on every loop iteration.
///
/// This is distinct from the active-run lease: the lease is a mutual-exclusion
/// token, the mode is intent. Observing `Paused` or `Suspended` must stop a
/// worker from making forward progress until it observes `Live` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Live,
    Suspended,
    Paused,
}

// =============================================================================
// ZERO-YIELD DIAGNOSTICS
// =============================================================================

/// Severity of a zero-yield diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStatus {
    Ok,
    Warning,
    Paused,
}

/// Health signal raised when a run burns attempts without saving anything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZeroYieldDiagnostic {
    pub status: DiagnosticStatus,
    /// Consecutive zero-save attempts observed when the diagnostic was issued.
    pub attempts: u32,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// =============================================================================
// SAVE COUNTERS
// =============================================================================

/// Per-topic save counters used for run-level reporting, not correctness.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveCounters {
    pub total: i64,
    pub controversy: i64,
    pub history: i64,
}

/// Category counter bumped alongside `total` on an accepted save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    Controversy,
    History,
}

// =============================================================================
// AUDIT TRAIL
// =============================================================================

/// Why a candidate was rejected before fetch/acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    AlreadySeen,
    NearDuplicate,
    UnreliableHost,
}

/// A pipeline decision recorded in the per-topic audit trail.
///
/// Producer-defined payloads pass through via [`AuditEvent::Opaque`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    CandidateAccepted {
        url: String,
        content_id: Uuid,
        content_hash: String,
        priority: i32,
    },
    CandidateRejected {
        url: String,
        reason: RejectReason,
    },
    FetchOutcome {
        host: String,
        success: bool,
        ema: f64,
    },
    RunStarted {
        run_id: Uuid,
    },
    RunPaused {
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<Uuid>,
        reason: String,
    },
    ZeroYield {
        attempts: u32,
        status: DiagnosticStatus,
    },
    FeedEnqueued {
        content_id: Uuid,
    },
    Opaque {
        payload: JsonValue,
    },
}

/// A stored audit entry as returned by a page read.
///
/// Rows that no longer deserialize as [`AuditEvent`] are surfaced as
/// [`AuditRecord::Raw`] rather than dropped, so one corrupt entry never
/// blocks a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AuditRecord {
    Event(AuditEvent),
    Raw { raw: String },
}

/// One page of the audit trail, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPage {
    pub items: Vec<AuditRecord>,
    pub next_offset: i64,
    pub has_more: bool,
}

// =============================================================================
// FEED QUEUE
// =============================================================================

/// Lifecycle status of a feed queue item.
///
/// `Pending → Processing → {Done, Failed}`; `Failed` returns to `Pending`
/// only while the retry budget lasts. Terminal rows are retained for
/// idempotency and observability, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

/// A durable unit of content-to-memory work.
///
/// Uniqueness key: `(topic_id, content_id, content_hash)` — re-enqueuing the
/// same triple is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub content_id: Uuid,
    pub content_hash: String,
    pub priority: i32,
    pub status: FeedStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub picked_at: Option<DateTime<Utc>>,
}

/// Result of an idempotent enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new PENDING item was inserted.
    Enqueued(Uuid),
    /// An item with the same triple already exists in the queue.
    AlreadyEnqueued,
    /// A memory record for the triple already exists; nothing to do.
    AlreadyProcessed,
}

/// Result of processing a single feed item.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The item reached DONE during this call.
    Done,
    /// The item was already DONE (or its memory already existed).
    AlreadyDone,
    /// The item failed; `terminal` means it will not be retried.
    Failed { reason: String, terminal: bool },
}

impl ProcessOutcome {
    /// Whether this outcome counts as a success for batch accounting.
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Done | ProcessOutcome::AlreadyDone)
    }
}

/// Aggregate result of a batch scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Queue status counts for operator reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedQueueStats {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
    pub failed: i64,
    pub total: i64,
}

// =============================================================================
// CONTENT & MEMORY
// =============================================================================

/// A named entity extracted from or attached to content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A dated event extracted from or attached to content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub date: String,
    pub content: String,
}

/// Raw discovered content handed to the feed pipeline, with any structure
/// the extraction stage already produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContent {
    pub content_id: Uuid,
    pub topic_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub full_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why_it_matters: Option<String>,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

/// Bounded structured digest produced by the content packer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackedDigest {
    pub summary: String,
    pub facts: Vec<String>,
    pub entities: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
}

/// Request to create an agent memory record.
#[derive(Debug, Clone)]
pub struct NewAgentMemory {
    pub topic_id: Uuid,
    pub content_id: Uuid,
    pub content_hash: String,
    pub agent_id: Uuid,
    pub title: String,
    pub content: String,
}

/// A persisted agent memory record, created exactly once per triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMemory {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub content_id: Uuid,
    pub content_hash: String,
    pub agent_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome reported by an agent's ingestion entrypoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memories_created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_event_round_trip() {
        let event = AuditEvent::CandidateRejected {
            url: "https://example.org/a".to_string(),
            reason: RejectReason::NearDuplicate,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"candidate_rejected\""));
        assert!(json.contains("\"reason\":\"near_duplicate\""));

        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn audit_opaque_preserves_payload() {
        let event = AuditEvent::Opaque {
            payload: serde_json::json!({"planner": "v2", "queries": 3}),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn audit_record_wraps_malformed_rows() {
        let record = AuditRecord::Raw {
            raw: "{not json".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"raw\""));
    }

    #[test]
    fn feed_status_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&FeedStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::to_string(&FeedStatus::Done).unwrap(),
            "\"DONE\""
        );
    }

    #[test]
    fn run_mode_serializes_snake() {
        assert_eq!(serde_json::to_string(&RunMode::Live).unwrap(), "\"live\"");
        assert_eq!(
            serde_json::to_string(&RunMode::Suspended).unwrap(),
            "\"suspended\""
        );
    }

    #[test]
    fn process_outcome_success_classification() {
        assert!(ProcessOutcome::Done.is_success());
        assert!(ProcessOutcome::AlreadyDone.is_success());
        assert!(!ProcessOutcome::Failed {
            reason: "too short".to_string(),
            terminal: true
        }
        .is_success());
    }

    #[test]
    fn frontier_item_optional_fields_omitted() {
        let item = FrontierItem {
            id: "cand-1".to_string(),
            provider: "web_search".to_string(),
            cursor: "page=1".to_string(),
            priority: 0.8,
            angle: None,
            meta: None,
            payload: None,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("angle"));
        assert!(!json.contains("meta"));
    }

    #[test]
    fn entity_kind_serializes_as_type() {
        let entity = Entity {
            name: "Rust Foundation".to_string(),
            kind: "organization".to_string(),
        };
        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains("\"type\":\"organization\""));
    }

    #[test]
    fn zero_yield_diagnostic_round_trip() {
        let diag = ZeroYieldDiagnostic {
            status: DiagnosticStatus::Warning,
            attempts: 12,
            issued_at: Utc::now(),
            reason: Some("no saves after 12 pops".to_string()),
        };
        let json = serde_json::to_string(&diag).unwrap();
        let back: ZeroYieldDiagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diag);
    }
}
