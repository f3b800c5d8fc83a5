//! 64-bit SimHash fingerprinting for near-duplicate detection.
//!
//! Similar inputs produce fingerprints with a small Hamming distance, so a
//! candidate can be compared against a bounded window of recent fingerprints
//! with a cheap XOR + popcount per comparison.

/// Compute a 64-bit SimHash over whitespace-delimited tokens of `text`.
///
/// Each token is hashed with blake3 and its first 8 bytes contribute one
/// 64-bit vote vector; bit positions with a positive vote sum set the
/// corresponding fingerprint bit. Tokens shorter than 3 characters are
/// skipped — they carry no topical signal and flatten the distribution.
pub fn simhash64(text: &str) -> u64 {
    let mut votes = [0i32; 64];

    for token in text.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric());
        if token.len() < 3 {
            continue;
        }
        let digest = blake3::hash(token.to_lowercase().as_bytes());
        let word = u64::from_le_bytes(digest.as_bytes()[..8].try_into().unwrap());
        for (bit, vote) in votes.iter_mut().enumerate() {
            if word >> bit & 1 == 1 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }

    votes
        .iter()
        .enumerate()
        .fold(0u64, |acc, (bit, &vote)| {
            if vote > 0 {
                acc | 1 << bit
            } else {
                acc
            }
        })
}

/// Number of differing bits between two fingerprints.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_identical_fingerprint() {
        let text = "The city council approved the new transit budget on Tuesday";
        assert_eq!(simhash64(text), simhash64(text));
    }

    #[test]
    fn similar_text_closer_than_unrelated() {
        let a = "The city council approved the new transit budget on Tuesday evening \
                 after a long public comment session about bus service frequency";
        let b = "The city council approved the new transit budget on Wednesday evening \
                 after a long public comment session about bus service frequency";
        let c = "Quarterly earnings beat analyst expectations as cloud revenue surged \
                 driven by enterprise adoption of machine learning workloads";

        let near = hamming_distance(simhash64(a), simhash64(b));
        let far = hamming_distance(simhash64(a), simhash64(c));
        assert!(near < far);
        assert!(far > 7);
    }

    #[test]
    fn hamming_distance_basics() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0, u64::MAX), 64);
        assert_eq!(hamming_distance(0b1011, 0b0010), 2);
    }

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(simhash64(""), 0);
        assert_eq!(simhash64("a an to"), 0);
    }

    #[test]
    fn case_insensitive_tokens() {
        assert_eq!(
            simhash64("Transit Budget Approved"),
            simhash64("transit budget approved")
        );
    }
}
