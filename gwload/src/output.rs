use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, plan: &gwload_core::PlanConfig);
    fn on_outcome(&self) -> Option<gwload_core::OutcomeFn>;
    /// Called as each batch finishes, before the whole plan is done.
    fn on_batch(&self) -> Option<gwload_core::BatchFn>;
    fn print_report(&self, report: &gwload_core::PlanReport) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
