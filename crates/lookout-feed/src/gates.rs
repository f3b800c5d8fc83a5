//! Quality gates applied before content becomes agent memory.
//!
//! Gates run in order and short-circuit on the first failure. A gate failure
//! is terminal for the item — the content itself is disqualified, not the
//! infrastructure — so it is never retried.

use lookout_core::RawContent;

/// Gate thresholds, taken from the worker configuration.
#[derive(Debug, Clone, Copy)]
pub struct QualityGates {
    /// Minimum extracted-text length in bytes.
    pub min_text_bytes: usize,
    /// Minimum relevance score. Zero disables the gate: content is accepted
    /// regardless of score, deliberately, to maximize learning signal.
    pub min_relevance: f64,
}

/// Why content failed a gate. The rendered reason is stored on the item so
/// operators can tell "will never succeed" from "might succeed later".
#[derive(Debug, Clone, PartialEq)]
pub enum GateFailure {
    TextTooShort { actual: usize, required: usize },
    RelevanceTooLow { actual: f64, required: f64 },
}

impl std::fmt::Display for GateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateFailure::TextTooShort { actual, required } => write!(
                f,
                "extracted text too short: {actual} bytes < {required} bytes required"
            ),
            GateFailure::RelevanceTooLow { actual, required } => write!(
                f,
                "relevance score too low: {actual:.3} < {required:.3} required"
            ),
        }
    }
}

impl QualityGates {
    /// Evaluate all gates in order, returning the first failure.
    pub fn evaluate(&self, content: &RawContent) -> Result<(), GateFailure> {
        let text_bytes = content.full_text.len();
        if text_bytes < self.min_text_bytes {
            return Err(GateFailure::TextTooShort {
                actual: text_bytes,
                required: self.min_text_bytes,
            });
        }

        if self.min_relevance > 0.0 {
            let score = content.relevance_score.unwrap_or(0.0);
            if score < self.min_relevance {
                return Err(GateFailure::RelevanceTooLow {
                    actual: score,
                    required: self.min_relevance,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn content(text: &str, relevance: Option<f64>) -> RawContent {
        RawContent {
            content_id: Uuid::new_v4(),
            topic_id: Uuid::new_v4(),
            title: "Test".to_string(),
            url: None,
            full_text: text.to_string(),
            summary: None,
            why_it_matters: None,
            facts: Vec::new(),
            entities: Vec::new(),
            timeline: Vec::new(),
            relevance_score: relevance,
        }
    }

    #[test]
    fn short_text_fails_with_byte_counts() {
        let gates = QualityGates {
            min_text_bytes: 100,
            min_relevance: 0.0,
        };
        let err = gates.evaluate(&content("tiny", None)).unwrap_err();
        assert_eq!(
            err,
            GateFailure::TextTooShort {
                actual: 4,
                required: 100
            }
        );
        let reason = err.to_string();
        assert!(reason.contains("4 bytes"));
        assert!(reason.contains("100 bytes"));
    }

    #[test]
    fn relevance_gate_disabled_at_zero() {
        let gates = QualityGates {
            min_text_bytes: 1,
            min_relevance: 0.0,
        };
        // Even an absent/zero score passes when the gate is disabled.
        assert!(gates.evaluate(&content("long enough text", None)).is_ok());
        assert!(gates
            .evaluate(&content("long enough text", Some(0.0)))
            .is_ok());
    }

    #[test]
    fn relevance_gate_enforced_when_positive() {
        let gates = QualityGates {
            min_text_bytes: 1,
            min_relevance: 0.5,
        };
        assert!(gates
            .evaluate(&content("long enough text", Some(0.7)))
            .is_ok());

        let err = gates
            .evaluate(&content("long enough text", Some(0.2)))
            .unwrap_err();
        assert!(matches!(err, GateFailure::RelevanceTooLow { .. }));

        // Missing score counts as zero once the gate is enabled.
        let err = gates.evaluate(&content("long enough text", None)).unwrap_err();
        assert!(matches!(err, GateFailure::RelevanceTooLow { .. }));
    }

    #[test]
    fn text_gate_checked_before_relevance() {
        let gates = QualityGates {
            min_text_bytes: 100,
            min_relevance: 0.5,
        };
        let err = gates.evaluate(&content("tiny", Some(0.1))).unwrap_err();
        assert!(matches!(err, GateFailure::TextTooShort { .. }));
    }
}
