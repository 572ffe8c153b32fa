//! Request gate: per-client fixed-window rate limiting.
//!
//! Guards the checkout entry point against abuse. Counters are fixed-window:
//! the first request from a client starts a window; requests beyond capacity
//! within that window are denied with the seconds remaining until the window
//! ends; a request after the window has elapsed starts a fresh one.
//!
//! The limiter is an injected capability held in [`crate::state::AppState`],
//! not a global. State is process-wide and in-memory: each instance enforces
//! its own limit, so horizontal replication multiplies the effective
//! capacity. A shared counter store would be needed for a fleet-wide limit.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request admitted.
    Allow,
    /// Request denied; retry after the given number of seconds.
    Deny {
        /// Whole seconds until the client's window ends (rounded up, >= 1).
        retry_after_secs: u64,
    },
}

/// Per-window counter state for one client.
#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client IP.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    capacity: u32,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl FixedWindowLimiter {
    /// Create a limiter from gate settings.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            capacity: config.max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a request from `client` is admitted right now.
    pub fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now())
    }

    /// Check with an explicit clock reading.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let window = clients.entry(client).or_insert(Window {
            started_at: now,
            count: 0,
        });

        // A request past the window end starts a fresh window.
        if now.duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.capacity {
            let window_end = window.started_at + self.window;
            return Decision::Deny {
                retry_after_secs: seconds_until(window_end, now),
            };
        }

        window.count += 1;
        Decision::Allow
    }
}

/// Whole seconds from `now` until `deadline`, rounded up, never zero.
///
/// A denied client told to retry after 0 seconds would retry into the same
/// window, so the floor is one second.
fn seconds_until(deadline: Instant, now: Instant) -> u64 {
    let remaining = deadline.saturating_duration_since(now);
    let whole = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        whole + 1
    } else {
        whole.max(1)
    }
}
