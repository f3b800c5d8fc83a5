//! Topic scope — the namespace every piece of pipeline state is keyed by.
//!
//! A topic may have a "shadow" counterpart that mirrors all discovery
//! structures (frontier, seen set, fingerprints, hosts, runs, audit,
//! diagnostics, counters) under a separate namespace for dry-run
//! experimentation. Shadow and live state never intersect: every scoped
//! table keys rows by `(topic_id, shadow)` and every repository filters on
//! both columns.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one topic namespace, live or shadow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicScope {
    pub topic_id: Uuid,
    pub shadow: bool,
}

impl TopicScope {
    /// The live namespace for a topic.
    pub fn live(topic_id: Uuid) -> Self {
        Self {
            topic_id,
            shadow: false,
        }
    }

    /// The shadow (dry-run) namespace for a topic.
    pub fn shadow(topic_id: Uuid) -> Self {
        Self {
            topic_id,
            shadow: true,
        }
    }

    /// The shadow counterpart of this scope (identity for shadow scopes).
    pub fn to_shadow(self) -> Self {
        Self {
            shadow: true,
            ..self
        }
    }

    /// The live counterpart of this scope (identity for live scopes).
    pub fn to_live(self) -> Self {
        Self {
            shadow: false,
            ..self
        }
    }
}

impl std::fmt::Display for TopicScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.shadow {
            write!(f, "{}#shadow", self.topic_id)
        } else {
            write!(f, "{}", self.topic_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_and_shadow_differ() {
        let topic = Uuid::new_v4();
        assert_ne!(TopicScope::live(topic), TopicScope::shadow(topic));
        assert_eq!(TopicScope::live(topic).to_shadow(), TopicScope::shadow(topic));
        assert_eq!(TopicScope::shadow(topic).to_live(), TopicScope::live(topic));
    }

    #[test]
    fn display_marks_shadow() {
        let topic = Uuid::nil();
        assert!(!TopicScope::live(topic).to_string().contains("shadow"));
        assert!(TopicScope::shadow(topic).to_string().ends_with("#shadow"));
    }
}
