//! Fixed-window rate limiter keyed by caller identity (spec.md §4.8).
//!
//! Grounded on the teacher's locking discipline for shared mutable state
//! (`endpoint_cache.rs`, `oidc.rs`'s JWKS cache): one lock per limiter instance, guarding a
//! plain `HashMap`, with the critical section kept to a lookup plus a couple of integer writes.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Sweep every Kth `check` call to bound memory from abandoned keys (spec.md §4.8).
const SWEEP_INTERVAL: u64 = 100;

struct Window {
    start: Instant,
    count: u32,
}

struct Limits {
    limit: u32,
    window: Duration,
}

/// A fixed-window rate limiter for one endpoint tier (e.g. "5 requests / minute, IP-keyed").
pub struct RateLimiter {
    limits: Limits,
    windows: Mutex<HashMap<String, Window>>,
    calls_since_sweep: AtomicU64,
}

/// Outcome of a rate-limit check.
pub enum Decision {
    Allow,
    Deny { retry_after: Duration },
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Arc<Self> {
        Arc::new(Self {
            limits: Limits { limit, window },
            windows: Mutex::new(HashMap::new()),
            calls_since_sweep: AtomicU64::new(0),
        })
    }

    /// Record one request for `key` and decide whether it may proceed.
    ///
    /// An empty key is treated as "unidentifiable caller" by the middleware, not here — this
    /// method always counts whatever key it's given.
    pub fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        let decision = match windows.get_mut(key) {
            Some(w) if now.duration_since(w.start) < self.limits.window => {
                if w.count < self.limits.limit {
                    w.count += 1;
                    Decision::Allow
                } else {
                    let retry_after = (w.start + self.limits.window).saturating_duration_since(now);
                    Decision::Deny { retry_after }
                }
            }
            _ => {
                windows.insert(key.to_string(), Window { start: now, count: 1 });
                Decision::Allow
            }
        };

        drop(windows);
        self.maybe_sweep(now);
        decision
    }

    fn maybe_sweep(&self, now: Instant) {
        let calls = self.calls_since_sweep.fetch_add(1, Ordering::Relaxed) + 1;
        if calls % SWEEP_INTERVAL != 0 {
            return;
        }
        let window = self.limits.window;
        self.windows
            .lock()
            .retain(|_, w| now.duration_since(w.start) < window);
    }
}
