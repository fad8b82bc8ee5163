use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// One bar per batch, counting terminal outcomes.
pub(crate) struct HumanProgress {
    inner: Mutex<Inner>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));

        Self {
            inner: Mutex::new(Inner {
                multi,
                bars: HashMap::new(),
            }),
        }
    }

    pub(crate) fn add_batch(&self, label: &str, total: u64) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = inner.multi.add(ProgressBar::new(total));
        pb.set_style(bar_style());
        pb.set_prefix(label.to_string());
        pb.set_message("ok=0 failed=0");
        inner.bars.insert(label.to_string(), BatchBar { pb, ok: 0, failed: 0 });
    }

    /// Count one outcome and print `line` above the bars.
    pub(crate) fn record(&self, label: &str, success: bool, line: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        inner.multi.suspend(|| println!("{line}"));

        if let Some(bar) = inner.bars.get_mut(label) {
            if success {
                bar.ok += 1;
            } else {
                bar.failed += 1;
            }
            bar.pb.inc(1);
            bar.pb
                .set_message(format!("ok={} failed={}", bar.ok, bar.failed));
        }
    }

    /// Print a finished batch's summary above the bars and drop its bar.
    pub(crate) fn finish_batch(&self, label: &str, text: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(bar) = inner.bars.remove(label) {
            bar.pb.finish_and_clear();
            inner.multi.remove(&bar.pb);
        }
        inner.multi.suspend(|| println!("{text}"));
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for (_, b) in inner.bars.drain() {
            b.pb.finish_and_clear();
        }

        let _ = inner.multi.clear();
    }
}

struct Inner {
    multi: MultiProgress,
    bars: HashMap<String, BatchBar>,
}

struct BatchBar {
    pb: ProgressBar,
    ok: u64,
    failed: u64,
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}
