//! Host reliability scoring.
//!
//! The storage layer keeps one EMA scalar per host; the math lives here.
//! Consumers use low-EMA hosts to deprioritize or skip scheduling, which
//! applies backpressure to chronically failing sources without a hardcoded
//! blocklist.

use std::collections::HashMap;

use lookout_core::HostReliability;

/// Fold one fetch outcome into a host's EMA: `ema' = α·outcome + (1-α)·ema`.
///
/// A host with no prior score is seeded with the outcome itself, so a first
/// failure deprioritizes it immediately instead of starting from neutral.
pub fn update_ema(previous: Option<f64>, success: bool, alpha: f64) -> f64 {
    let outcome = if success { 1.0 } else { 0.0 };
    match previous {
        Some(prev) => alpha * outcome + (1.0 - alpha) * prev,
        None => outcome,
    }
}

/// Hosts whose EMA has dropped below `threshold`, sorted worst first.
pub fn unreliable_hosts(
    scores: &HashMap<String, HostReliability>,
    threshold: f64,
) -> Vec<String> {
    let mut hosts: Vec<(&String, f64)> = scores
        .iter()
        .filter(|(_, r)| r.ema < threshold)
        .map(|(host, r)| (host, r.ema))
        .collect();
    hosts.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    hosts.into_iter().map(|(host, _)| host.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn first_observation_seeds_with_outcome() {
        assert_eq!(update_ema(None, true, 0.3), 1.0);
        assert_eq!(update_ema(None, false, 0.3), 0.0);
    }

    #[test]
    fn success_pulls_toward_one() {
        let ema = update_ema(Some(0.5), true, 0.3);
        assert!((ema - 0.65).abs() < f64::EPSILON);
    }

    #[test]
    fn failure_pulls_toward_zero() {
        let ema = update_ema(Some(0.5), false, 0.3);
        assert!((ema - 0.35).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_stays_in_unit_interval() {
        let mut ema = Some(0.5);
        for i in 0..100 {
            let next = update_ema(ema, i % 3 == 0, 0.3);
            assert!((0.0..=1.0).contains(&next));
            ema = Some(next);
        }
    }

    #[test]
    fn unreliable_hosts_sorted_worst_first() {
        let now = Utc::now();
        let mut scores = HashMap::new();
        for (host, ema) in [("a.example", 0.9), ("b.example", 0.1), ("c.example", 0.2)] {
            scores.insert(
                host.to_string(),
                HostReliability {
                    ema,
                    updated_at: now,
                },
            );
        }

        let bad = unreliable_hosts(&scores, 0.3);
        assert_eq!(bad, vec!["b.example".to_string(), "c.example".to_string()]);
    }

    #[test]
    fn unreliable_hosts_empty_when_all_healthy() {
        let mut scores = HashMap::new();
        scores.insert(
            "a.example".to_string(),
            HostReliability {
                ema: 0.8,
                updated_at: Utc::now(),
            },
        );
        assert!(unreliable_hosts(&scores, 0.3).is_empty());
    }
}
