//! Zero-yield circuit breaker.
//!
//! A run that keeps popping frontier items without producing a single saved
//! item is burning fetch budget for nothing. The breaker counts consecutive
//! zero-save attempts for the current run loop, escalates a stored
//! diagnostic from `warning` to `paused`, and flips the run mode so the
//! worker stops on its next poll.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use lookout_core::{
    defaults, AuditEvent, AuditTrail, DiagnosticStatus, DiagnosticsRepository, Result, RunMode,
    RunRegistry, TopicScope, ZeroYieldDiagnostic,
};

/// What the worker should do after reporting an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerVerdict {
    /// Keep going.
    Proceed,
    /// A warning diagnostic was issued; keep going but expect a pause soon.
    Warned,
    /// The run was paused; stop making forward progress.
    Paused,
}

/// Per-run-loop zero-yield tracker.
///
/// The consecutive-attempt counter is loop-local state for the run that owns
/// the lease; the diagnostic and the mode flip are written to the shared
/// store where every worker observes them.
pub struct ZeroYieldBreaker {
    diagnostics: Arc<dyn DiagnosticsRepository>,
    runs: Arc<dyn RunRegistry>,
    audit: Arc<dyn AuditTrail>,
    warn_after: u32,
    pause_after: u32,
    audit_cap: i64,
    zero_saves: u32,
}

impl ZeroYieldBreaker {
    pub fn new(
        diagnostics: Arc<dyn DiagnosticsRepository>,
        runs: Arc<dyn RunRegistry>,
        audit: Arc<dyn AuditTrail>,
    ) -> Self {
        Self {
            diagnostics,
            runs,
            audit,
            warn_after: defaults::ZERO_YIELD_WARN_ATTEMPTS,
            pause_after: defaults::ZERO_YIELD_PAUSE_ATTEMPTS,
            audit_cap: defaults::AUDIT_CAP,
            zero_saves: 0,
        }
    }

    /// Override the escalation thresholds (mainly for tests).
    pub fn with_thresholds(mut self, warn_after: u32, pause_after: u32) -> Self {
        self.warn_after = warn_after;
        self.pause_after = pause_after;
        self
    }

    /// Consecutive zero-save attempts observed so far.
    pub fn zero_saves(&self) -> u32 {
        self.zero_saves
    }

    /// Report an accepted save: resets the streak and clears any diagnostic.
    pub async fn record_save(&mut self, scope: &TopicScope) -> Result<()> {
        self.zero_saves = 0;
        self.diagnostics.clear(scope).await
    }

    /// Report a frontier attempt that produced no save, escalating as the
    /// streak crosses the warning and pause thresholds.
    pub async fn record_zero_yield(&mut self, scope: &TopicScope) -> Result<BreakerVerdict> {
        self.zero_saves += 1;

        if self.zero_saves >= self.pause_after {
            let diagnostic = ZeroYieldDiagnostic {
                status: DiagnosticStatus::Paused,
                attempts: self.zero_saves,
                issued_at: Utc::now(),
                reason: Some(format!(
                    "no saved items after {} attempts",
                    self.zero_saves
                )),
            };
            self.diagnostics.set(scope, &diagnostic).await?;
            self.runs.set_run_state(scope, RunMode::Paused).await?;
            self.audit
                .append(
                    scope,
                    &AuditEvent::ZeroYield {
                        attempts: self.zero_saves,
                        status: DiagnosticStatus::Paused,
                    },
                    self.audit_cap,
                )
                .await?;
            self.audit
                .append(
                    scope,
                    &AuditEvent::RunPaused {
                        run_id: self.runs.get_active_run(scope).await?,
                        reason: "zero-yield circuit breaker".to_string(),
                    },
                    self.audit_cap,
                )
                .await?;
            warn!(
                topic_id = %scope.topic_id,
                attempts = self.zero_saves,
                "Zero-yield breaker paused run"
            );
            return Ok(BreakerVerdict::Paused);
        }

        if self.zero_saves >= self.warn_after {
            let diagnostic = ZeroYieldDiagnostic {
                status: DiagnosticStatus::Warning,
                attempts: self.zero_saves,
                issued_at: Utc::now(),
                reason: Some(format!(
                    "no saved items after {} attempts",
                    self.zero_saves
                )),
            };
            self.diagnostics.set(scope, &diagnostic).await?;
            self.audit
                .append(
                    scope,
                    &AuditEvent::ZeroYield {
                        attempts: self.zero_saves,
                        status: DiagnosticStatus::Warning,
                    },
                    self.audit_cap,
                )
                .await?;
            info!(
                topic_id = %scope.topic_id,
                attempts = self.zero_saves,
                "Zero-yield warning issued"
            );
            return Ok(BreakerVerdict::Warned);
        }

        Ok(BreakerVerdict::Proceed)
    }
}
