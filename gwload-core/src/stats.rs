use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::call::CallType;
use crate::runner::Outcome;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatsKey {
    pub gateway: String,
    pub call_type: CallType,
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
    retries: AtomicU64,
    duration_ms_total: AtomicU64,
}

/// Live counters for one (gateway, call type) pair.
#[derive(Debug, Clone)]
pub struct StatsHandle {
    counters: Arc<Counters>,
}

impl StatsHandle {
    pub fn record(&self, outcome: &Outcome) {
        let c = &self.counters;
        c.total.fetch_add(1, Ordering::Relaxed);
        if outcome.success {
            c.success.fetch_add(1, Ordering::Relaxed);
        } else {
            c.failure.fetch_add(1, Ordering::Relaxed);
        }
        c.retries
            .fetch_add(u64::from(outcome.retry_count), Ordering::Relaxed);
        c.duration_ms_total
            .fetch_add(outcome.duration_ms(), Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRow {
    pub key: StatsKey,
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub retries: u64,
    pub avg_duration_ms: u64,
}

/// Per gateway/call type counters shared by every batch of a run.
#[derive(Debug, Default)]
pub struct StatsBoard {
    entries: Mutex<BTreeMap<StatsKey, Arc<Counters>>>,
}

impl StatsBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, gateway: &str, call_type: CallType) -> StatsHandle {
        let key = StatsKey {
            gateway: gateway.to_string(),
            call_type,
        };

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let counters = entries.entry(key).or_default().clone();

        StatsHandle { counters }
    }

    /// Rows ordered by gateway, then call type.
    pub fn snapshot(&self) -> Vec<StatsRow> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        entries
            .iter()
            .map(|(key, c)| {
                let total = c.total.load(Ordering::Relaxed);
                let duration_ms_total = c.duration_ms_total.load(Ordering::Relaxed);
                StatsRow {
                    key: key.clone(),
                    total,
                    success: c.success.load(Ordering::Relaxed),
                    failure: c.failure.load(Ordering::Relaxed),
                    retries: c.retries.load(Ordering::Relaxed),
                    avg_duration_ms: duration_ms_total.checked_div(total).unwrap_or(0),
                }
            })
            .collect()
    }
}
