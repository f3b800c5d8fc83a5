//! # lookout-discovery
//!
//! Discovery-worker-side logic for the lookout pipeline.
//!
//! This crate provides:
//! - Candidate intake: exact and near-duplicate screening, acceptance
//!   bookkeeping, and audit writes
//! - Host reliability EMA updates feeding score-based backpressure
//! - The zero-yield circuit breaker that pauses runs burning fetch budget
//!   without producing saves
//! - Run lifecycle helpers: lease acquisition with the single-active-run
//!   check, and mode polling translated into worker control flow
//!
//! Fetching and parsing themselves are external; this crate decides what is
//! worth fetching and records what happened.

pub mod breaker;
pub mod intake;
pub mod lifecycle;
pub mod reliability;

// Re-export core types
pub use lookout_core::*;

pub use breaker::{BreakerVerdict, ZeroYieldBreaker};
pub use intake::{Acceptance, CandidateIntake, DiscoveryConfig, IntakeDecision};
pub use lifecycle::{RunControl, RunLifecycle};
pub use reliability::{unreliable_hosts, update_ema};
