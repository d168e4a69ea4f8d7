use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, interval};

use crate::error::AppError;
use crate::metrics::TRACKED_CLIENTS;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

// Usage entry - tracks requests per client in the current window
#[derive(Debug, Clone, Copy)]
pub struct ClientUsage {
    pub count: u32,
    pub window_start: Instant,
}

impl ClientUsage {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    // Start a fresh window once the old one has run out
    fn roll_over(&mut self, now: Instant, window: Duration) {
        if now.saturating_duration_since(self.window_start) >= window {
            self.count = 0;
            self.window_start = now;
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub daily_limit: u32,
    pub guarded_prefix: String,
    pub window: Duration,
}

impl QuotaConfig {
    pub fn new(daily_limit: u32, guarded_prefix: impl Into<String>) -> Self {
        Self {
            daily_limit,
            guarded_prefix: guarded_prefix.into(),
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

/// Outcome of charging one guarded request against a client's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { remaining: u32 },
    Rejected,
}

/// Per-client request counter for a guarded path prefix.
///
/// Each client key lives in a `DashMap` entry, and every read-check-increment
/// happens while that entry's shard lock is held. Two requests from the same
/// client are therefore serialized, and the count can never pass `daily_limit`.
/// Requests from different clients only contend when they hash to the same shard.
///
/// A slot is charged when the request is let through. It is not refunded if the
/// downstream handler later fails or is cancelled.
pub struct QuotaTracker {
    clients: DashMap<String, ClientUsage>,
    daily_limit: u32,
    guarded_prefix: String,
    window: Duration,
}

impl QuotaTracker {
    pub fn new(config: QuotaConfig) -> Result<Self, AppError> {
        if config.daily_limit == 0 {
            return Err(AppError::Config(
                "daily limit must be a positive integer".to_string(),
            ));
        }
        if config.window.is_zero() {
            return Err(AppError::Config(
                "quota window must be longer than zero".to_string(),
            ));
        }

        Ok(Self {
            clients: DashMap::new(),
            daily_limit: config.daily_limit,
            guarded_prefix: config.guarded_prefix,
            window: config.window,
        })
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    pub fn guarded_prefix(&self) -> &str {
        &self.guarded_prefix
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_guarded(&self, path: &str) -> bool {
        path.starts_with(&self.guarded_prefix)
    }

    /// Charge one guarded request to `client`.
    ///
    /// Once the limit is reached the request is rejected and nothing is counted.
    pub fn check_and_consume(&self, client: &str) -> QuotaDecision {
        let now = Instant::now();

        let mut usage = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| ClientUsage::new(now));

        usage.roll_over(now, self.window);

        // limit reached..? reject without counting
        if usage.count >= self.daily_limit {
            return QuotaDecision::Rejected;
        }

        usage.count += 1;
        QuotaDecision::Allowed {
            remaining: self.daily_limit - usage.count,
        }
    }

    /// Remaining quota for `client` without charging anything.
    ///
    /// Creates the record on first sight and applies a pending rollover.
    pub fn remaining(&self, client: &str) -> u32 {
        let now = Instant::now();

        let mut usage = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| ClientUsage::new(now));

        usage.roll_over(now, self.window);
        self.daily_limit.saturating_sub(usage.count)
    }

    pub fn usage(&self, client: &str) -> Option<ClientUsage> {
        self.clients.get(client).map(|entry| *entry)
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Drop every record whose window has expired, returns how many went.
    pub fn evict_stale(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.clients.retain(|_, usage| {
            let live = now.saturating_duration_since(usage.window_start) < self.window;
            if !live {
                removed += 1;
            }
            live
        });

        removed
    }
}

// Background eviction loop - keeps the client map from growing forever
pub async fn run_evictor(tracker: Arc<QuotaTracker>, every: Duration) {
    if every.is_zero() {
        tracing::warn!("quota evictor disabled, interval is zero");
        return;
    }

    let mut ticker = interval(every);
    // first tick completes immediately
    ticker.tick().await;

    tracing::info!(interval = ?every, "quota evictor started");

    loop {
        ticker.tick().await;

        let removed = tracker.evict_stale();
        let tracked = tracker.tracked_clients();
        TRACKED_CLIENTS.set(tracked as f64);

        if removed > 0 {
            tracing::info!(removed, tracked, "evicted stale quota records");
        } else {
            tracing::debug!(tracked, "no stale quota records");
        }
    }
}
