use std::fmt::Write as _;
use std::time::Duration;

use crate::runner::Outcome;

/// Aggregate statistics over the outcomes of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_retries: u64,
    /// Mean over all outcomes, successful and failed alike.
    pub avg_duration: Duration,
    /// Outcome lines missing from the batch log because the append failed.
    pub unlogged: u64,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let mut s = Self::default();
        let mut duration_total_ns: u128 = 0;

        for o in outcomes {
            s.total += 1;
            if o.success {
                s.successes += 1;
            } else {
                s.failures += 1;
            }
            s.total_retries += u64::from(o.retry_count);
            duration_total_ns += o.duration.as_nanos();
        }

        if s.total > 0 {
            let avg_ns = duration_total_ns / u128::from(s.total);
            s.avg_duration = Duration::from_nanos(u64::try_from(avg_ns).unwrap_or(u64::MAX));
        }
        s
    }

    pub fn avg_duration_ms(&self) -> u64 {
        u64::try_from(self.avg_duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Plain-text block appended to the batch log.
    pub fn render_block(&self, label: &str) -> String {
        let mut out = String::new();
        writeln!(&mut out, "--- summary: {label} ---").ok();
        writeln!(&mut out, "total requests: {}", self.total).ok();
        writeln!(&mut out, "successful: {}", self.successes).ok();
        writeln!(&mut out, "failed: {}", self.failures).ok();
        writeln!(&mut out, "total retries: {}", self.total_retries).ok();
        writeln!(&mut out, "average duration: {} ms", self.avg_duration_ms()).ok();
        if self.unlogged > 0 {
            writeln!(&mut out, "unlogged outcomes: {}", self.unlogged).ok();
        }
        out
    }
}
