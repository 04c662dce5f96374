//! Request-rate and daily-spend limits for the external generator.
//!
//! [`BudgetGuard::allow`] runs its whole check-and-record sequence under a
//! single lock, so concurrent callers can never jointly overshoot either
//! limit.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};

/// Configuration for [`BudgetGuard`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Maximum generator requests inside one window.
    pub max_requests: usize,

    /// Length of the sliding window in seconds.
    pub window_secs: u64,

    /// Estimated spend allowed per UTC day.
    pub daily_budget: f64,

    /// Estimated price per 1000 input tokens.
    pub price_per_1k_tokens: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
            daily_budget: 1.0,
            price_per_1k_tokens: 0.00002, // text-embedding-3-small
        }
    }
}

impl BudgetConfig {
    /// Set the sliding window limit.
    pub fn with_rate_limit(mut self, max_requests: usize, window_secs: u64) -> Self {
        self.max_requests = max_requests;
        self.window_secs = window_secs;
        self
    }

    /// Set the daily spend limit.
    pub fn with_daily_budget(mut self, daily_budget: f64) -> Self {
        self.daily_budget = daily_budget;
        self
    }

    /// Set the token price used by [`BudgetGuard::estimate_cost`].
    pub fn with_price_per_1k_tokens(mut self, price: f64) -> Self {
        self.price_per_1k_tokens = price;
        self
    }
}

/// Outcome of a budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetDecision {
    /// Call the generator; the request has been recorded.
    Proceed,
    /// Spend limit reached: serve from cache or fallback only.
    CacheOnly,
    /// Rate limit reached.
    Reject,
}

struct BudgetState {
    request_timestamps: VecDeque<DateTime<Utc>>,
    daily_spend: f64,
    day: NaiveDate,
}

/// Sliding-window rate limiter plus daily cost circuit breaker.
pub struct BudgetGuard {
    config: BudgetConfig,
    window: Duration,
    state: Mutex<BudgetState>,
    clock: Arc<dyn Clock>,
}

impl BudgetGuard {
    /// Create a guard using the system clock.
    pub fn new(config: BudgetConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a guard driven by the given clock.
    pub fn with_clock(config: BudgetConfig, clock: Arc<dyn Clock>) -> Self {
        let window = i64::try_from(config.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        let day = clock.now().date_naive();

        Self {
            config,
            window,
            state: Mutex::new(BudgetState {
                request_timestamps: VecDeque::new(),
                daily_spend: 0.0,
                day,
            }),
            clock,
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Estimate the cost of embedding `text` (about four characters per token).
    pub fn estimate_cost(&self, text: &str) -> f64 {
        let tokens = text.chars().count().div_ceil(4).max(1);
        tokens as f64 * self.config.price_per_1k_tokens / 1000.0
    }

    /// Decide whether a generator call costing `cost_estimate` may proceed.
    pub async fn allow(&self, cost_estimate: f64) -> BudgetDecision {
        let mut state = self.state.lock().await;
        // Read the clock under the lock so timestamps enter the window in order.
        let now = self.clock.now();

        let today = now.date_naive();
        if today != state.day {
            info!(
                "Budget day rolled over to {today}, resetting spend of {:.6}",
                state.daily_spend
            );
            state.day = today;
            state.daily_spend = 0.0;
        }

        while state
            .request_timestamps
            .front()
            .is_some_and(|ts| now - *ts >= self.window)
        {
            state.request_timestamps.pop_front();
        }

        if state.request_timestamps.len() >= self.config.max_requests {
            warn!(
                "Rate limit reached: {} requests in {}s window",
                state.request_timestamps.len(),
                self.config.window_secs
            );
            return BudgetDecision::Reject;
        }

        if state.daily_spend + cost_estimate > self.config.daily_budget {
            warn!(
                "Daily budget of {:.6} would be exceeded, serving from cache only",
                self.config.daily_budget
            );
            return BudgetDecision::CacheOnly;
        }

        state.request_timestamps.push_back(now);
        state.daily_spend += cost_estimate;
        debug!(
            "Budget allows request ({} in window, spend {:.6})",
            state.request_timestamps.len(),
            state.daily_spend
        );
        BudgetDecision::Proceed
    }

    /// Current counters, for diagnostics.
    pub async fn snapshot(&self) -> BudgetSnapshot {
        let state = self.state.lock().await;
        let now = self.clock.now();
        let requests_in_window = state
            .request_timestamps
            .iter()
            .filter(|ts| now - **ts < self.window)
            .count();
        let daily_spend = if now.date_naive() == state.day {
            state.daily_spend
        } else {
            0.0
        };

        BudgetSnapshot {
            requests_in_window,
            max_requests: self.config.max_requests,
            daily_spend,
            daily_budget: self.config.daily_budget,
        }
    }
}

/// Point-in-time view of the budget counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub requests_in_window: usize,
    pub max_requests: usize,
    pub daily_spend: f64,
    pub daily_budget: f64,
}
