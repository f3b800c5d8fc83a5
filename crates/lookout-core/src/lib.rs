//! # lookout-core
//!
//! Core types, traits, and abstractions for the lookout discovery pipeline.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other lookout crates depend on: the topic scope (live/shadow
//! namespacing), the frontier/feed domain models, repository traits, SimHash
//! fingerprinting, and text sanitation helpers.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod memstore;
pub mod models;
pub mod scope;
pub mod simhash;
pub mod textutil;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use memstore::MemStore;
pub use models::*;
pub use scope::TopicScope;
pub use simhash::{hamming_distance, simhash64};
pub use textutil::{content_hash, split_sentences, truncate_at_boundary};
pub use traits::*;
