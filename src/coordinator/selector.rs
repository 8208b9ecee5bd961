//! Node selection strategies for the download router
//!
//! Selection never errors: an empty candidate set yields `None` and the
//! router falls back to serving locally.

use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pluggable policy for picking a download target among live nodes.
pub trait NodeSelector: Send + Sync {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a String>;
}

/// Baseline policy: uniform random choice. No load awareness, no
/// latency awareness, no consistent hashing.
#[derive(Debug, Default)]
pub struct RandomSelector;

impl NodeSelector for RandomSelector {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a String> {
        candidates.choose(&mut rand::thread_rng())
    }
}

/// Alternative policy: atomic cursor over the candidate list.
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    cursor: AtomicUsize,
}

impl NodeSelector for RoundRobinSelector {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a String> {
        if candidates.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_random_empty_is_none() {
        let selector = RandomSelector;
        assert!(selector.select(&[]).is_none());
    }

    #[test]
    fn test_random_single_element() {
        let selector = RandomSelector;
        let candidates = vec!["10.0.0.1:9000".to_string()];
        for _ in 0..10 {
            assert_eq!(selector.select(&candidates), Some(&candidates[0]));
        }
    }

    #[test]
    fn test_random_roughly_uniform() {
        let selector = RandomSelector;
        let candidates: Vec<String> = (0..4).map(|i| format!("10.0.0.{}:9000", i)).collect();

        let mut counts: HashMap<&String, u32> = HashMap::new();
        let trials = 4000;
        for _ in 0..trials {
            let picked = selector.select(&candidates).unwrap();
            *counts.entry(picked).or_default() += 1;
        }

        // Each of 4 candidates expects ~1000 picks; allow a wide margin
        for addr in &candidates {
            let n = counts.get(addr).copied().unwrap_or(0);
            assert!(n > 700, "candidate {} picked only {} times", addr, n);
            assert!(n < 1300, "candidate {} picked {} times", addr, n);
        }
    }

    #[test]
    fn test_round_robin_cycles() {
        let selector = RoundRobinSelector::default();
        let candidates: Vec<String> = vec!["a:1".into(), "b:2".into(), "c:3".into()];

        let picks: Vec<&String> = (0..6).map(|_| selector.select(&candidates).unwrap()).collect();
        assert_eq!(picks[0], picks[3]);
        assert_eq!(picks[1], picks[4]);
        assert_eq!(picks[2], picks[5]);
        assert_ne!(picks[0], picks[1]);
    }

    #[test]
    fn test_round_robin_empty_is_none() {
        let selector = RoundRobinSelector::default();
        assert!(selector.select(&[]).is_none());
    }
}
