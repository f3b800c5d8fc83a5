//! Run lifecycle helpers: lease acquisition and mode polling.
//!
//! The registry stores the lease and the mode; this module turns them into
//! worker behavior. `begin` performs the single-active-run check (checked,
//! not globally enforced — a caller that skips it can still stomp a lease),
//! and `poll` is the cancellation mechanism a worker consults between
//! frontier pops.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use lookout_core::{
    defaults, AuditEvent, AuditTrail, Error, Result, RunMode, RunRegistry, TopicScope,
};

/// What a polling worker should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunControl {
    /// Mode is `live` and this run still holds the lease: keep working.
    Continue,
    /// Mode is `paused`/`suspended`: hold without forward progress.
    Hold,
    /// The lease expired, was cleared, or belongs to another run: stop.
    Stop,
}

/// Lease-aware run lifecycle manager.
pub struct RunLifecycle {
    runs: Arc<dyn RunRegistry>,
    audit: Arc<dyn AuditTrail>,
    lease_ttl_secs: i64,
    audit_cap: i64,
}

impl RunLifecycle {
    pub fn new(runs: Arc<dyn RunRegistry>, audit: Arc<dyn AuditTrail>) -> Self {
        Self {
            runs,
            audit,
            lease_ttl_secs: defaults::RUN_LEASE_TTL_SECS,
            audit_cap: defaults::AUDIT_CAP,
        }
    }

    /// Override the lease TTL (mainly for tests).
    pub fn with_lease_ttl(mut self, ttl_secs: i64) -> Self {
        self.lease_ttl_secs = ttl_secs;
        self
    }

    /// Claim the topic for `run_id`.
    ///
    /// Fails with [`Error::RunActive`] if another non-expired lease is held.
    pub async fn begin(&self, scope: &TopicScope, run_id: Uuid) -> Result<()> {
        if let Some(active) = self.runs.get_active_run(scope).await? {
            if active != run_id {
                return Err(Error::RunActive {
                    topic_id: scope.topic_id,
                    run_id: active,
                });
            }
        }

        self.runs
            .set_active_run(scope, run_id, self.lease_ttl_secs)
            .await?;
        self.audit
            .append(scope, &AuditEvent::RunStarted { run_id }, self.audit_cap)
            .await?;

        info!(topic_id = %scope.topic_id, run_id = %run_id, "Run started");
        Ok(())
    }

    /// Release the topic: clears the lease and the mode together.
    pub async fn finish(&self, scope: &TopicScope) -> Result<()> {
        self.runs.clear_active_run(scope).await?;
        info!(topic_id = %scope.topic_id, "Run finished");
        Ok(())
    }

    /// Decide whether the worker owning `run_id` should continue.
    ///
    /// Workers call this between frontier pops and before content
    /// processing, so an operator pause or a lost lease takes effect at the
    /// next iteration boundary — never mid-item.
    pub async fn poll(&self, scope: &TopicScope, run_id: Uuid) -> Result<RunControl> {
        match self.runs.get_active_run(scope).await? {
            None => Ok(RunControl::Stop),
            Some(active) if active != run_id => Ok(RunControl::Stop),
            Some(_) => match self.runs.get_run_state(scope).await? {
                Some(RunMode::Live) => Ok(RunControl::Continue),
                Some(RunMode::Paused) | Some(RunMode::Suspended) => Ok(RunControl::Hold),
                None => Ok(RunControl::Stop),
            },
        }
    }
}
