//! Centralized default constants for the lookout pipeline.
//!
//! **This module is the single source of truth** for all shared default
//! values. The worker crates and daemon binary reference these constants
//! instead of defining their own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// FRONTIER
// =============================================================================

/// Maximum frontier entries per topic scope. Pushing beyond this evicts the
/// lowest-priority entries, so fresh high-priority work is never lost to an
/// old low-priority backlog.
pub const FRONTIER_CAPACITY: i64 = 2000;

// =============================================================================
// DEDUPLICATION
// =============================================================================

/// Seen-URL membership expiry in days. A URL processed more than this long
/// ago becomes eligible for re-discovery.
pub const SEEN_TTL_DAYS: i64 = 30;

/// Number of most-recent fingerprints retained per topic scope. Near-dup
/// checks scan this window linearly; it is bounded so the scan stays cheap
/// relative to fetch latency.
pub const FINGERPRINT_WINDOW: i64 = 1000;

/// Maximum Hamming distance (bits) at which two SimHash fingerprints are
/// treated as near-duplicates.
pub const HAMMING_THRESHOLD: u32 = 7;

// =============================================================================
// HOST RELIABILITY
// =============================================================================

/// Expiry in days for a topic's host reliability map, refreshed on write.
pub const HOST_RELIABILITY_TTL_DAYS: i64 = 14;

/// EMA smoothing factor for host reliability updates.
pub const HOST_EMA_ALPHA: f64 = 0.3;

/// Hosts with an EMA below this are considered unreliable and deprioritized.
pub const HOST_UNRELIABLE_BELOW: f64 = 0.3;

// =============================================================================
// RUN LIFECYCLE
// =============================================================================

/// Active-run lease TTL in seconds (1 hour). A crashed worker's lease
/// expires after this, releasing the topic for a new run.
pub const RUN_LEASE_TTL_SECS: i64 = 3600;

// =============================================================================
// AUDIT TRAIL
// =============================================================================

/// Maximum audit events retained per topic scope (oldest dropped).
pub const AUDIT_CAP: i64 = 2000;

/// Default audit page size.
pub const AUDIT_PAGE_LIMIT: i64 = 50;

// =============================================================================
// ZERO-YIELD DIAGNOSTICS
// =============================================================================

/// Diagnostic record expiry in seconds (30 minutes).
pub const DIAGNOSTIC_TTL_SECS: i64 = 1800;

/// Consecutive zero-save attempts before a `warning` diagnostic is issued.
pub const ZERO_YIELD_WARN_ATTEMPTS: u32 = 10;

/// Consecutive zero-save attempts before the run is paused.
pub const ZERO_YIELD_PAUSE_ATTEMPTS: u32 = 20;

// =============================================================================
// SAVE COUNTERS
// =============================================================================

/// Save counter expiry in seconds (6 hours). Counters are run-level
/// reporting state, not correctness state.
pub const SAVE_COUNTER_TTL_SECS: i64 = 21_600;

// =============================================================================
// FEED QUEUE
// =============================================================================

/// Default maximum processing attempts per feed item.
pub const FEED_MAX_ATTEMPTS: i32 = 3;

/// Default number of PENDING items selected per batch scan.
pub const FEED_BATCH_SIZE: i64 = 10;

/// Default maximum concurrently processed feed items per worker.
pub const FEED_MAX_CONCURRENT: usize = 4;

/// Default worker scan interval in milliseconds when the queue is idle.
pub const FEED_POLL_INTERVAL_MS: u64 = 2000;

/// A PROCESSING item older than this (seconds) is treated as stalled and
/// returned to PENDING by the next housekeeping scan.
pub const FEED_STALLED_AFTER_SECS: i64 = 600;

// =============================================================================
// QUALITY GATES
// =============================================================================

/// Minimum extracted-text length in bytes for content to qualify.
pub const MIN_TEXT_BYTES: usize = 100;

/// Minimum relevance score gate. Zero disables the gate entirely — content
/// is accepted regardless of score to maximize learning signal.
pub const MIN_RELEVANCE_SCORE: f64 = 0.0;

// =============================================================================
// CONTENT PACKER
// =============================================================================

/// Maximum sentences in a packed summary.
pub const PACK_SUMMARY_SENTENCES: usize = 6;

/// Maximum facts in a packed digest.
pub const PACK_MAX_FACTS: usize = 12;

/// Minimum characters for a fact to be worth keeping.
pub const PACK_FACT_MIN_CHARS: usize = 20;

/// Maximum entities in a packed digest (case-insensitively deduplicated).
pub const PACK_MAX_ENTITIES: usize = 20;

/// Maximum timeline entries in a packed digest.
pub const PACK_MAX_TIMELINE: usize = 10;

/// Character budget for composed memory content.
pub const PACK_CONTENT_BUDGET: usize = 8000;

/// Fraction of the truncation budget (from the end) inside which a sentence
/// boundary is preferred over a word boundary.
pub const TRUNCATE_SENTENCE_WINDOW: f64 = 0.2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontier_and_window_caps_positive() {
        const {
            assert!(FRONTIER_CAPACITY > 0);
            assert!(FINGERPRINT_WINDOW > 0);
            assert!(AUDIT_CAP > 0);
        }
    }

    #[test]
    fn zero_yield_escalation_ordered() {
        const {
            assert!(ZERO_YIELD_WARN_ATTEMPTS < ZERO_YIELD_PAUSE_ATTEMPTS);
        }
    }

    #[test]
    fn hamming_threshold_fits_fingerprint_width() {
        const {
            assert!(HAMMING_THRESHOLD < 64);
        }
    }

    #[test]
    fn ema_alpha_in_unit_interval() {
        assert!(HOST_EMA_ALPHA > 0.0 && HOST_EMA_ALPHA < 1.0);
        assert!(HOST_UNRELIABLE_BELOW > 0.0 && HOST_UNRELIABLE_BELOW < 1.0);
    }

    #[test]
    fn relevance_gate_disabled_by_default() {
        assert_eq!(MIN_RELEVANCE_SCORE, 0.0);
    }

    #[test]
    fn truncate_window_is_a_fraction() {
        assert!(TRUNCATE_SENTENCE_WINDOW > 0.0 && TRUNCATE_SENTENCE_WINDOW < 1.0);
    }
}
