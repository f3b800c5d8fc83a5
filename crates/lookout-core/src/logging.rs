//! Structured logging schema and field name constants for lookout.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), run transitions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-candidate iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "discovery", "feed", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "frontier", "intake", "breaker", "worker", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "push", "pop", "enqueue", "process_one", "requeue_stalled"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Topic UUID that partitions all pipeline state.
pub const TOPIC_ID: &str = "topic_id";

/// Run UUID holding (or contending for) the active-run lease.
pub const RUN_ID: &str = "run_id";

/// Feed queue item UUID being processed.
pub const ITEM_ID: &str = "item_id";

/// Content UUID in the idempotency triple.
pub const CONTENT_ID: &str = "content_id";

/// Source hostname for reliability tracking.
pub const HOST: &str = "host";

/// Candidate URL under evaluation.
pub const URL: &str = "url";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of items affected by an operation.
pub const RESULT_COUNT: &str = "result_count";

/// Current PENDING depth of the feed queue.
pub const QUEUE_DEPTH: &str = "queue_depth";

/// Processing attempt number for a feed item.
pub const ATTEMPT: &str = "attempt";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Reason string for a rejection or terminal failure.
pub const REASON: &str = "reason";
