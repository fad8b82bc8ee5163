use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::format_duration_single;
use progress::HumanProgress;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, plan: &gwload_core::PlanConfig) {
        for gw in &plan.gateways {
            println!("gateway: {gw}");
        }
        let types: Vec<String> = plan.call_types.iter().map(ToString::to_string).collect();
        println!("test: {}", types.join(", "));
        println!(
            "concurrency: {} per batch, retries: {}, retry delay: {}, timeout: {}",
            plan.concurrency,
            plan.policy.max_retries,
            format_duration_single(plan.policy.retry_delay),
            format_duration_single(plan.timeout)
        );
        println!("logs: {}", plan.log_dir.display());
        println!();

        for target in plan.targets() {
            self.progress.add_batch(&target.label(), plan.concurrency);
        }
    }

    fn on_outcome(&self) -> Option<gwload_core::OutcomeFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |o: &gwload_core::Outcome| {
            let label = format!("{}_{}", o.gateway, o.call_type);
            progress.record(&label, o.success, &o.log_line());
        }))
    }

    fn on_batch(&self) -> Option<gwload_core::BatchFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |b: &gwload_core::BatchReport| {
            progress.finish_batch(&b.target.label(), &summary::render_batch(b));
        }))
    }

    fn print_report(&self, report: &gwload_core::PlanReport) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", summary::render_stats(&report.stats));
        Ok(())
    }
}
