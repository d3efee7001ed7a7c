use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Strategy choosing one destination from a discovery-provided list.
///
/// Pure selection only: no health tracking, no weighting. Implementations
/// must return `None` exactly when `candidates` is empty.
pub trait AddressSelector: Send + Sync {
    fn select(
        &self,
        service_path: &str,
        service_method: &str,
        candidates: &[String],
    ) -> Option<String>;
}

/// Picks a uniformly random candidate.
pub struct RandomSelector;

impl AddressSelector for RandomSelector {
    fn select(
        &self,
        _service_path: &str,
        _service_method: &str,
        candidates: &[String],
    ) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..candidates.len());
        Some(candidates[index].clone())
    }
}

/// Rotates through candidates in order.
pub struct RoundRobinSelector {
    counter: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobinSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSelector for RoundRobinSelector {
    fn select(
        &self,
        _service_path: &str,
        _service_method: &str,
        candidates: &[String],
    ) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_empty_returns_none() {
        assert_eq!(RandomSelector.select("S", "m", &[]), None);
    }

    #[test]
    fn test_random_picks_from_candidates() {
        let candidates = vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()];
        for _ in 0..50 {
            let picked = RandomSelector.select("S", "m", &candidates).unwrap();
            assert!(candidates.contains(&picked));
        }
    }

    #[test]
    fn test_round_robin_rotates() {
        let selector = RoundRobinSelector::new();
        let candidates = vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()];

        assert_eq!(selector.select("S", "m", &candidates).unwrap(), "a:1");
        assert_eq!(selector.select("S", "m", &candidates).unwrap(), "b:2");
        assert_eq!(selector.select("S", "m", &candidates).unwrap(), "c:3");
        // wraps around
        assert_eq!(selector.select("S", "m", &candidates).unwrap(), "a:1");
    }

    #[test]
    fn test_round_robin_empty_returns_none() {
        let selector = RoundRobinSelector::new();
        assert_eq!(selector.select("S", "m", &[]), None);
    }
}
