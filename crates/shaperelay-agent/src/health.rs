//! Relay health tracking: passive monitoring based on real relay outcomes.
//!
//! `RelayStats` records success/failure/latency of provider calls in a rolling
//! 5-minute window, plus process-lifetime counters for the status report.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::provider::ProviderError;

/// Rolling window duration for relay outcome tracking.
const WINDOW_SECS: u64 = 300; // 5 minutes

/// Provider health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Ok,
    Degraded,
    Down,
    Unknown,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Degraded => write!(f, "degraded"),
            Self::Down => write!(f, "down"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Public snapshot of relay health.
#[derive(Debug, Clone, Serialize)]
pub struct RelaySnapshot {
    pub status: ProviderStatus,
    pub uptime_secs: u64,
    pub last_success_at: Option<i64>,
    pub last_error_at: Option<i64>,
    pub last_error: Option<String>,
    pub avg_latency_ms: u64,
    pub relays_ok: u32,
    pub relays_err: u32,
    pub events_dispatched: u64,
    pub replies_delivered: u64,
    pub fallbacks_sent: u64,
}

struct Window {
    /// Rolling window of (timestamp, was_success, latency_ms).
    entries: VecDeque<(Instant, bool, u64)>,
    last_success_at: Option<i64>,
    last_error_at: Option<i64>,
    last_error: Option<String>,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(Duration::from_secs(WINDOW_SECS)) else {
            return;
        };
        while self.entries.front().is_some_and(|(t, _, _)| *t < cutoff) {
            self.entries.pop_front();
        }
    }

    fn derive_status(&self) -> ProviderStatus {
        if self.entries.is_empty() {
            return ProviderStatus::Unknown;
        }

        let total = self.entries.len() as f64;
        let ok_count = self.entries.iter().filter(|(_, ok, _)| *ok).count() as f64;
        let success_rate = ok_count / total;

        if success_rate > 0.8 {
            ProviderStatus::Ok
        } else if success_rate >= 0.5 {
            ProviderStatus::Degraded
        } else {
            ProviderStatus::Down
        }
    }

    /// Average over successful relays only; failures carry no latency.
    fn avg_latency_ms(&self) -> u64 {
        let latencies: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, ok, _)| *ok)
            .map(|(_, _, lat)| *lat)
            .collect();
        if latencies.is_empty() {
            return 0;
        }
        latencies.iter().sum::<u64>() / latencies.len() as u64
    }
}

/// Process-wide relay statistics, shared by the dispatcher, the status
/// command and the keep-alive health endpoint.
pub struct RelayStats {
    started: Instant,
    window: Mutex<Window>,
    events_dispatched: AtomicU64,
    replies_delivered: AtomicU64,
    fallbacks_sent: AtomicU64,
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            window: Mutex::new(Window {
                entries: VecDeque::new(),
                last_success_at: None,
                last_error_at: None,
                last_error: None,
            }),
            events_dispatched: AtomicU64::new(0),
            replies_delivered: AtomicU64::new(0),
            fallbacks_sent: AtomicU64::new(0),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record_success(&self, latency_ms: u64) {
        let now = Instant::now();
        let mut window = self.lock();
        window.prune(now);
        window.entries.push_back((now, true, latency_ms));
        window.last_success_at = Some(chrono::Utc::now().timestamp());
    }

    pub fn record_error(&self, error: &ProviderError) {
        let now = Instant::now();
        let mut window = self.lock();
        window.prune(now);
        window.entries.push_back((now, false, 0));
        window.last_error_at = Some(chrono::Utc::now().timestamp());
        window.last_error = Some(error.to_string());
    }

    pub fn record_event(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reply(&self) {
        self.replies_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        let mut window = self.lock();
        window.prune(Instant::now());
        RelaySnapshot {
            status: window.derive_status(),
            uptime_secs: self.uptime().as_secs(),
            last_success_at: window.last_success_at,
            last_error_at: window.last_error_at,
            last_error: window.last_error.clone(),
            avg_latency_ms: window.avg_latency_ms(),
            relays_ok: window.entries.iter().filter(|(_, ok, _)| *ok).count() as u32,
            relays_err: window.entries.iter().filter(|(_, ok, _)| !*ok).count() as u32,
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            replies_delivered: self.replies_delivered.load(Ordering::Relaxed),
            fallbacks_sent: self.fallbacks_sent.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Window> {
        // A panic while holding the lock leaves plain counters behind; keep going.
        self.window.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
