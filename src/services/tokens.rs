// src/services/tokens.rs

//! API token pool with a per-token rate-limit reset table.
//!
//! Each token carries the epoch second at which its rate window is believed
//! to reset (0 = never observed limited). Selection always returns the token
//! with the earliest reset, so a fresh token is preferred over an exhausted
//! one and traffic rotates as limits are hit. The table is advisory: entries
//! only ever move forward in time, and a token whose reset lies in the past
//! counts as usable again.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{AppError, Result};

pub struct TokenPool {
    tokens: Vec<String>,
    resets: Vec<AtomicI64>,
}

impl TokenPool {
    pub fn new(tokens: Vec<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(AppError::validation("at least one API token is required"));
        }
        let resets = tokens.iter().map(|_| AtomicI64::new(0)).collect();
        Ok(Self { tokens, resets })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token string for a pool index. The index must come from
    /// [`least_limited`](Self::least_limited).
    pub fn token(&self, index: usize) -> &str {
        &self.tokens[index]
    }

    /// Index of the token with the earliest known reset; ties resolve to the
    /// lowest index, so a fresh pool always starts at token 0.
    pub fn least_limited(&self) -> usize {
        let mut best = 0;
        let mut best_reset = i64::MAX;
        for (index, reset) in self.resets.iter().enumerate() {
            let value = reset.load(Ordering::Relaxed);
            if value < best_reset {
                best = index;
                best_reset = value;
            }
        }
        best
    }

    /// Record that a token was observed rate limited until `reset_at`.
    /// Stale reports never move a reset backwards.
    pub fn record_limited(&self, index: usize, reset_at: i64) {
        self.resets[index].fetch_max(reset_at, Ordering::Relaxed);
    }

    /// True when every token's reset lies strictly in the future. A reset
    /// equal to `now` counts as already usable.
    pub fn all_limited(&self, now: i64) -> bool {
        self.resets
            .iter()
            .all(|reset| reset.load(Ordering::Relaxed) > now)
    }

    /// Earliest reset across the pool; the shortest wait that frees at least
    /// one token.
    pub fn earliest_reset(&self) -> i64 {
        self.resets
            .iter()
            .map(|reset| reset.load(Ordering::Relaxed))
            .min()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> TokenPool {
        let tokens = (0..n).map(|i| format!("token-{i}")).collect();
        TokenPool::new(tokens).unwrap()
    }

    #[test]
    fn rejects_empty_token_list() {
        assert!(TokenPool::new(Vec::new()).is_err());
    }

    #[test]
    fn fresh_pool_selects_first_token() {
        let pool = pool(3);
        assert_eq!(pool.least_limited(), 0);
        assert_eq!(pool.token(0), "token-0");
    }

    #[test]
    fn exhausted_token_is_passed_over() {
        let pool = pool(2);
        pool.record_limited(0, 2_000);
        assert_eq!(pool.least_limited(), 1);
    }

    #[test]
    fn selects_earliest_reset_when_all_recorded() {
        let pool = pool(3);
        pool.record_limited(0, 3_000);
        pool.record_limited(1, 1_000);
        pool.record_limited(2, 2_000);
        assert_eq!(pool.least_limited(), 1);
    }

    #[test]
    fn tie_resolves_to_lowest_index() {
        let pool = pool(3);
        pool.record_limited(0, 500);
        pool.record_limited(1, 500);
        pool.record_limited(2, 500);
        assert_eq!(pool.least_limited(), 0);
    }

    #[test]
    fn record_limited_never_moves_backwards() {
        let pool = pool(1);
        pool.record_limited(0, 2_000);
        pool.record_limited(0, 1_500);
        assert_eq!(pool.earliest_reset(), 2_000);
    }

    #[test]
    fn all_limited_requires_strictly_future_resets() {
        let pool = pool(2);
        pool.record_limited(0, 1_000);
        pool.record_limited(1, 1_000);

        assert!(pool.all_limited(999));
        // A reset exactly at `now` means the token is usable again.
        assert!(!pool.all_limited(1_000));
        assert!(!pool.all_limited(1_001));
    }

    #[test]
    fn unrecorded_token_keeps_pool_unlimited() {
        let pool = pool(2);
        pool.record_limited(0, i64::MAX);
        assert!(!pool.all_limited(0));
        assert_eq!(pool.earliest_reset(), 0);
    }

    #[test]
    fn earliest_reset_tracks_minimum() {
        let pool = pool(3);
        pool.record_limited(0, 900);
        pool.record_limited(1, 300);
        pool.record_limited(2, 600);
        assert_eq!(pool.earliest_reset(), 300);
    }
}
