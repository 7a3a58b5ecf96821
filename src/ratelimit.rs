//! Fixed-window request admission control.
//!
//! Tracks per-key request counts over fixed windows and decides
//! allow/deny before a request reaches the paste store. A request may be
//! subject to several limits at once (a global ceiling plus a stricter
//! per-route ceiling); all applicable limits are evaluated together and
//! none is consumed unless every one of them allows the request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::{RateLimitConfig, RateLimitRule};

/// Category of operation with its own configured ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Read,
    Create,
    Delete,
    Admin,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Read => "read",
            RouteClass::Create => "create",
            RouteClass::Delete => "delete",
            RouteClass::Admin => "admin",
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    /// Metadata for the tightest applicable limit; `None` when no rule
    /// applies (unlimited).
    pub quota: Option<QuotaInfo>,
    /// Time until the denying window resets; set only on deny.
    pub retry_after: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
pub struct QuotaInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl Decision {
    fn unlimited() -> Self {
        Self {
            allowed: true,
            quota: None,
            retry_after: None,
        }
    }
}

/// Counting state for one admission key. Owned exclusively by the
/// limiter, never persisted; resets with the process.
#[derive(Debug)]
struct Window {
    start_ms: u64,
    count: u32,
    window_ms: u64,
}

/// In-memory fixed-window rate limiter with per-key locking.
pub struct RateLimiter {
    rules: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: RwLock<HashMap<String, Arc<Mutex<Window>>>>,
}

impl RateLimiter {
    pub fn new(rules: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules,
            clock,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate every limit applicable to `key`/`class` and consume quota
    /// from all of them, or from none if any limit denies.
    pub fn check_and_consume(&self, key: &str, class: RouteClass) -> Decision {
        let mut applicable: Vec<(String, RateLimitRule)> = Vec::with_capacity(2);
        if let Some(rule) = self.rules.global {
            applicable.push((format!("global:{key}"), rule));
        }
        if let Some(rule) = self.rules.rule_for(class) {
            applicable.push((format!("{}:{key}", class.as_str()), rule));
        }

        if applicable.is_empty() {
            // No configured ceiling for this request: fail open.
            return Decision::unlimited();
        }

        // Deterministic lock order so two requests hitting the same pair
        // of windows cannot deadlock.
        applicable.sort_by(|a, b| a.0.cmp(&b.0));

        let handles: Vec<(Arc<Mutex<Window>>, RateLimitRule)> = applicable
            .iter()
            .map(|(window_key, rule)| (self.window_handle(window_key, rule), *rule))
            .collect();

        let now = self.clock.now_unix_ms();
        let mut guards: Vec<(MutexGuard<'_, Window>, RateLimitRule)> = handles
            .iter()
            .map(|(handle, rule)| (lock_window(handle), *rule))
            .collect();

        // Roll every window forward first; a reset is correct whether or
        // not the request ends up allowed.
        for (window, _) in guards.iter_mut() {
            if now >= window.start_ms + window.window_ms {
                window.start_ms = now;
                window.count = 0;
            }
        }

        let mut retry_after: Option<Duration> = None;
        for (window, rule) in guards.iter() {
            if window.count >= rule.requests {
                let wait = Duration::from_millis(window.start_ms + window.window_ms - now);
                retry_after = Some(retry_after.map_or(wait, |prev| prev.max(wait)));
            }
        }

        if let Some(retry_after) = retry_after {
            // Denied: leave every count untouched.
            return Decision {
                allowed: false,
                quota: Some(QuotaInfo {
                    limit: tightest_limit(&guards),
                    remaining: 0,
                    reset_after: retry_after,
                }),
                retry_after: Some(retry_after),
            };
        }

        let mut quota: Option<QuotaInfo> = None;
        for (window, rule) in guards.iter_mut() {
            window.count += 1;
            let info = QuotaInfo {
                limit: rule.requests,
                remaining: rule.requests - window.count,
                reset_after: Duration::from_millis(window.start_ms + window.window_ms - now),
            };
            quota = Some(match quota {
                Some(prev) if prev.remaining <= info.remaining => prev,
                _ => info,
            });
        }

        Decision {
            allowed: true,
            quota,
            retry_after: None,
        }
    }

    /// Drop window entries whose interval has fully elapsed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_unix_ms();
        let mut windows = self
            .windows
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, handle| {
            // An in-flight check may already hold a clone of this handle;
            // removing the entry would let it count against a window no
            // longer in the map. New clones are only taken under the map
            // lock, which we hold, so a count of 1 means nobody else can
            // reach this window.
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            let window = lock_window(handle);
            now < window.start_ms + window.window_ms
        });
        before - windows.len()
    }

    fn window_handle(&self, window_key: &str, rule: &RateLimitRule) -> Arc<Mutex<Window>> {
        {
            let windows = self.windows.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(handle) = windows.get(window_key) {
                return Arc::clone(handle);
            }
        }

        let mut windows = self
            .windows
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let clock = &self.clock;
        let handle = windows.entry(window_key.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Window {
                start_ms: clock.now_unix_ms(),
                count: 0,
                window_ms: rule.window.as_millis() as u64,
            }))
        });
        Arc::clone(handle)
    }
}

fn lock_window<'a>(handle: &'a Arc<Mutex<Window>>) -> MutexGuard<'a, Window> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

fn tightest_limit(guards: &[(MutexGuard<'_, Window>, RateLimitRule)]) -> u32 {
    guards
        .iter()
        .map(|(_, rule)| rule.requests)
        .min()
        .unwrap_or(0)
}
