//! Rate/Quota Guard
//!
//! Fixed-window admission counter per caller identity. The check and the
//! increment happen under one lock, so concurrent callers can never overbook
//! the last slot. Denials do not consume a slot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{AgentError, Result};

/// Windows idle for this many window lengths are dropped
const STALE_WINDOWS: u32 = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per identity per window
    pub max_requests: u32,

    /// Window length
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_secs == 0 {
            return Err(AgentError::Config("rate limit window_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Admission decision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl Admission {
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Clone, Copy, Debug)]
struct RateState {
    count: u32,
    window_start: Instant,
}

#[derive(Debug)]
struct Windows {
    by_identity: HashMap<String, RateState>,
    last_purge: Instant,
}

/// Per-identity fixed-window throttle
#[derive(Debug)]
pub struct RateGuard {
    config: RateLimitConfig,
    windows: Mutex<Windows>,
}

impl RateGuard {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(Windows {
                by_identity: HashMap::new(),
                last_purge: Instant::now(),
            }),
        }
    }

    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn admit(&self, identity: &str) -> Admission {
        self.admit_at(identity, Instant::now())
    }

    /// Admission check against an explicit clock reading
    pub fn admit_at(&self, identity: &str, now: Instant) -> Admission {
        let window = self.config.window();
        // the counters stay consistent even if a holder panicked
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if now.saturating_duration_since(windows.last_purge) >= window {
            let horizon = window * STALE_WINDOWS;
            windows
                .by_identity
                .retain(|_, state| now.saturating_duration_since(state.window_start) < horizon);
            windows.last_purge = now;
        }

        let state = windows
            .by_identity
            .entry(identity.to_string())
            .or_insert(RateState {
                count: 0,
                window_start: now,
            });

        let mut elapsed = now.saturating_duration_since(state.window_start);
        if elapsed >= window {
            state.count = 0;
            state.window_start = now;
            elapsed = Duration::ZERO;
        }

        if state.count >= self.config.max_requests {
            let retry_after = window.saturating_sub(elapsed);
            tracing::debug!(identity, ?retry_after, "Rate limit denied request");
            return Admission::Denied { retry_after };
        }

        state.count += 1;
        Admission::Allowed {
            remaining: self.config.max_requests - state.count,
        }
    }

    /// Identities currently tracked
    pub fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_identity
            .len()
    }
}
