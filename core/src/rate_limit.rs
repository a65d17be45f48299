//! Denial Rate Limiter.
//!
//! Tracks per-tool-name consecutive denials and computes an exponentially
//! growing back-off window so a model that keeps retrying a denied
//! operation gets short-circuited to `RateLimited` instead of re-prompting
//! the operator every turn.

use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

const BLOCK_THRESHOLD: u32 = 3;
const BASE_WINDOW: Duration = Duration::from_secs(30);
const MAX_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct Record {
    consecutive_denials: u32,
    last_denial: Instant,
    next_allowed: Instant,
}

/// Per-process (or per-subagent) denial tracker. A fresh rate limiter is
/// allocated whenever a new `Engine` is created — `init_from_parent` never
/// inherits a parent's rate-limit state.
#[derive(Debug, Default)]
pub struct RateLimiter {
    records: HashMap<String, Record>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a denial of `tool_name`, incrementing its consecutive count
    /// and (once the threshold is reached) extending the back-off window.
    pub fn record_denial(&mut self, tool_name: &str) {
        let now = Instant::now();
        let record = self
            .records
            .entry(tool_name.to_string())
            .or_insert_with(|| Record {
                consecutive_denials: 0,
                last_denial: now,
                next_allowed: now,
            });
        record.consecutive_denials += 1;
        record.last_denial = now;
        if record.consecutive_denials >= BLOCK_THRESHOLD {
            let window = back_off_window(record.consecutive_denials);
            record.next_allowed = record.last_denial + window;
        }
    }

    /// `true` once `tool_name` has accrued at least [`BLOCK_THRESHOLD`]
    /// consecutive denials and the back-off window hasn't elapsed yet.
    pub fn is_blocked(&self, tool_name: &str) -> bool {
        match self.records.get(tool_name) {
            Some(record) => {
                record.consecutive_denials >= BLOCK_THRESHOLD && Instant::now() < record.next_allowed
            }
            None => false,
        }
    }

    /// Seconds remaining until `tool_name` is unblocked, rounded up; `0` if
    /// it isn't currently blocked.
    pub fn remaining(&self, tool_name: &str) -> u64 {
        match self.records.get(tool_name) {
            Some(record) => {
                let now = Instant::now();
                if now >= record.next_allowed {
                    0
                } else {
                    (record.next_allowed - now).as_secs().max(1)
                }
            }
            None => 0,
        }
    }

    /// Zero the denial counter for `tool_name`. Called whenever a decision
    /// resolves to `Allowed` or `AllowedAlways`.
    pub fn reset(&mut self, tool_name: &str) {
        self.records.remove(tool_name);
    }
}

fn back_off_window(consecutive_denials: u32) -> Duration {
    let exponent = consecutive_denials - BLOCK_THRESHOLD;
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    BASE_WINDOW.saturating_mul(factor).min(MAX_WINDOW)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_blocked_below_threshold() {
        let mut limiter = RateLimiter::new();
        limiter.record_denial("shell");
        limiter.record_denial("shell");
        assert!(!limiter.is_blocked("shell"));
    }

    #[test]
    fn blocked_at_threshold() {
        let mut limiter = RateLimiter::new();
        for _ in 0..3 {
            limiter.record_denial("shell");
        }
        assert!(limiter.is_blocked("shell"));
        assert!(limiter.remaining("shell") > 0);
    }

    #[test]
    fn reset_clears_block() {
        let mut limiter = RateLimiter::new();
        for _ in 0..3 {
            limiter.record_denial("shell");
        }
        limiter.reset("shell");
        assert!(!limiter.is_blocked("shell"));
        assert_eq!(limiter.remaining("shell"), 0);
    }

    #[test]
    fn back_off_grows_exponentially_and_caps() {
        assert_eq!(back_off_window(3), Duration::from_secs(30));
        assert_eq!(back_off_window(4), Duration::from_secs(60));
        assert_eq!(back_off_window(5), Duration::from_secs(120));
        // 30 * 2^5 = 960s would exceed the 5-minute cap.
        assert_eq!(back_off_window(8), MAX_WINDOW);
    }

    #[test]
    fn unknown_tool_is_never_blocked() {
        let limiter = RateLimiter::new();
        assert!(!limiter.is_blocked("never-seen"));
        assert_eq!(limiter.remaining("never-seen"), 0);
    }
}
