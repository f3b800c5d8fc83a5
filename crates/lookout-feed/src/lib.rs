//! # lookout-feed
//!
//! Idempotent content-to-memory feed worker for the lookout pipeline.
//!
//! This crate provides:
//! - Quality gates (minimum text length, optional relevance threshold)
//! - The content packer producing bounded digests
//! - `process_one`/`process_batch` with idempotent short-circuits, bounded
//!   concurrency, and failure isolation
//! - A polling worker loop with graceful shutdown and broadcast events
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lookout_feed::{FeedConfig, FeedProcessor, FeedWorker};
//! use lookout_core::NullAnalyzer;
//!
//! let processor = FeedProcessor::new(
//!     feed_repo,
//!     memory_repo,
//!     content_store,
//!     agent_directory,
//!     Arc::new(NullAnalyzer),
//!     FeedConfig::from_env(),
//! );
//! let handle = FeedWorker::new(processor).start();
//!
//! // …
//! handle.shutdown().await?;
//! ```

pub mod gates;
pub mod packer;
pub mod worker;

// Re-export core types
pub use lookout_core::*;

pub use gates::{GateFailure, QualityGates};
pub use packer::{ContentPacker, PackerBounds};
pub use worker::{FeedConfig, FeedProcessor, FeedWorker, WorkerEvent, WorkerHandle};

/// Default maximum attempts for failed feed items.
pub const DEFAULT_MAX_ATTEMPTS: i32 = lookout_core::defaults::FEED_MAX_ATTEMPTS;

/// Default scan interval for the worker loop (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = lookout_core::defaults::FEED_POLL_INTERVAL_MS;
