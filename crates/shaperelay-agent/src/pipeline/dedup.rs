//! At-most-once guards for event handling and fallback notices.
//!
//! Two independent moka caches: ids already admitted for processing, and ids
//! that already produced a fallback error notice. Entries expire after the
//! configured window and each cache holds at most `capacity` ids.

use std::time::Duration;

use moka::sync::Cache;

use shaperelay_core::config::DedupConfig;

/// Set of recently seen ids, bounded by time-to-live and capacity.
pub type SeenIds = Cache<String, ()>;

fn seen_ids(window: Duration, capacity: u64) -> SeenIds {
    Cache::builder()
        .max_capacity(capacity)
        .time_to_live(window)
        .build()
}

/// Record `id` if absent. Only the caller that actually inserted the entry
/// gets `true`; concurrent callers on the same id see the existing entry.
fn first_sighting(cache: &SeenIds, id: &str) -> bool {
    cache.entry(id.to_string()).or_insert(()).is_fresh()
}

/// Process-wide dedup ledger.
pub struct DedupLedger {
    processed: SeenIds,
    error_notified: SeenIds,
}

impl DedupLedger {
    pub fn new(window: Duration, capacity: u64) -> Self {
        Self {
            processed: seen_ids(window, capacity),
            error_notified: seen_ids(window, capacity),
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.capacity)
    }

    /// `true` the first time `event_id` is seen; `false` afterwards.
    pub fn should_process(&self, event_id: &str) -> bool {
        first_sighting(&self.processed, event_id)
    }

    /// `true` the first time a fallback notice is requested for `event_id`.
    pub fn should_notify_error(&self, event_id: &str) -> bool {
        first_sighting(&self.error_notified, event_id)
    }
}
