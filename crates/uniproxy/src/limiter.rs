//! Sliding-window rate limiting
//!
//! Each identifier carries a ledger of request instants. An arrival is
//! admitted while fewer than `max_requests` instants fall inside the last
//! `window`; the ledger is pruned on every check and a piggybacked,
//! jittered sweep reclaims idle identifiers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Admission policy: at most `max_requests` per `window` per identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    /// Until the window resets: the full window on admission, the time the
    /// oldest counted request exits the window on denial (at least 1 s)
    pub reset_in: Duration,
}

/// Per-identifier sliding-window request ledger.
///
/// Cloning creates a new handle to the SAME ledger map. The limiter is
/// defense in depth: no persistence, no cross-process coordination.
#[derive(Clone)]
pub struct RateLimiter {
    ledgers: Arc<DashMap<String, VecDeque<Instant>>>,
    policy: RateLimitPolicy,
    last_sweep: Arc<Mutex<Instant>>,
    cleanup_interval: Duration,
}

impl RateLimiter {
    /// Create a limiter with the given policy
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            ledgers: Arc::new(DashMap::new()),
            policy,
            last_sweep: Arc::new(Mutex::new(Instant::now())),
            cleanup_interval: Duration::from_secs(10),
        }
    }

    /// Override the sweep interval
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// The configured policy
    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Decide whether this arrival is admitted; if so, record it.
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        let now = Instant::now();
        self.maybe_sweep(now);

        let mut ledger = self.ledgers.entry(identifier.to_string()).or_default();
        Self::prune(&mut ledger, now, self.policy.window);

        if ledger.len() >= self.policy.max_requests {
            let reset_in = ledger
                .front()
                .map(|&oldest| {
                    Self::ceil_secs((oldest + self.policy.window).saturating_duration_since(now))
                })
                .unwrap_or(self.policy.window);

            return RateLimitDecision {
                allowed: false,
                limit: self.policy.max_requests,
                remaining: 0,
                reset_in,
            };
        }

        ledger.push_back(now);
        RateLimitDecision {
            allowed: true,
            limit: self.policy.max_requests,
            remaining: self.policy.max_requests - ledger.len(),
            reset_in: self.policy.window,
        }
    }

    /// Number of identifiers currently tracked
    pub fn ledger_count(&self) -> usize {
        self.ledgers.len()
    }

    /// Drop all ledgers
    pub fn reset(&self) {
        self.ledgers.clear();
    }

    fn prune(ledger: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&front) = ledger.front() {
            if now.duration_since(front) >= window {
                ledger.pop_front();
            } else {
                break;
            }
        }
    }

    /// Round up to whole seconds, never below one
    fn ceil_secs(duration: Duration) -> Duration {
        let mut secs = duration.as_secs();
        if duration.subsec_nanos() > 0 {
            secs += 1;
        }
        Duration::from_secs(secs.max(1))
    }

    /// Piggybacked sweep over all ledgers, dropping expired timestamps and
    /// identifiers whose ledgers become empty
    fn maybe_sweep(&self, now: Instant) {
        {
            let mut last = self.last_sweep.lock();
            let jitter = 0.8 + rand::random::<f64>() * 0.4;
            let interval = self.cleanup_interval.mul_f64(jitter);
            if now.duration_since(*last) < interval {
                return;
            }
            *last = now;
        }

        let window = self.policy.window;
        self.ledgers.retain(|_, ledger| {
            Self::prune(ledger, now, window);
            !ledger.is_empty()
        });
    }
}
