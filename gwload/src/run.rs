use anyhow::Context as _;
use std::time::SystemTime;

use crate::cli::Cli;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::{RunError, classify_core_error};
use crate::settings::{self, Settings};

pub async fn run(args: Cli) -> Result<ExitCode, RunError> {
    let env = settings::process_env();
    let settings = Settings::resolve(&args, &env).map_err(RunError::InvalidInput)?;

    let prompts = match &settings.prompts_file {
        Some(path) => gwload_core::Prompts::load(path)
            .await
            .with_context(|| format!("failed to load prompts from {}", path.display()))
            .map_err(RunError::InvalidInput)?,
        None => gwload_core::Prompts::default(),
    };

    let plan = settings
        .into_plan(prompts, run_id(SystemTime::now(), std::process::id()))
        .map_err(classify_core_error)?;

    tracing::debug!(
        gateways = plan.gateways.len(),
        batches = plan.targets().len(),
        concurrency = plan.concurrency,
        run_id = %plan.run_id,
        "resolved run plan"
    );

    let out = output::formatter(args.output);
    out.print_header(&plan);

    let report = gwload_core::run_plan(
        &plan,
        gwload_core::HttpClient::default(),
        out.on_outcome(),
        out.on_batch(),
    )
    .await
    .map_err(classify_core_error)?;

    out.print_report(&report).map_err(RunError::RuntimeError)?;
    ensure_fully_logged(&report)?;

    // Failed requests are part of the report, not a process failure.
    Ok(ExitCode::Success)
}

/// Millisecond RFC 3339 timestamp plus the process id, with `:` replaced so it is safe in file
/// names on every platform. Two runs never share log files or an image directory.
fn run_id(now: SystemTime, pid: u32) -> String {
    let ts = humantime::format_rfc3339_millis(now)
        .to_string()
        .replace(':', "-");
    format!("{ts}_{pid}")
}

fn ensure_fully_logged(report: &gwload_core::PlanReport) -> Result<(), RunError> {
    let unlogged: u64 = report.batches.iter().map(|b| b.summary.unlogged).sum();
    if unlogged > 0 {
        return Err(RunError::RuntimeError(anyhow::anyhow!(
            "{unlogged} outcome line(s) could not be written to the batch logs"
        )));
    }
    Ok(())
}
