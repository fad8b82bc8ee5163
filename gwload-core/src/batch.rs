use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::runner::{Outcome, Runner};
use crate::stats::StatsHandle;
use crate::summary::RunSummary;

/// Observer invoked once per terminal outcome, in completion order.
pub type OutcomeFn = Arc<dyn Fn(&Outcome) + Send + Sync>;

/// Launch `count` invocations of `runner` at once and wait for all of them.
///
/// Request numbers start at 1. With a non-zero `stagger`, invocation `i` starts `i * stagger`
/// after the batch. Individual request failures end up in the summary; only a failed join (a
/// panicked invocation) or a log write failure fails the batch.
pub async fn run_batch(
    count: u64,
    stagger: Duration,
    runner: Arc<Runner>,
    stats: StatsHandle,
    on_outcome: Option<OutcomeFn>,
) -> Result<RunSummary> {
    if count == 0 {
        return Err(Error::InvalidConcurrency);
    }

    let mut tasks = spawn_staggered(count, stagger, |index| {
        let runner = runner.clone();
        async move { runner.run(index).await }
    });

    let mut outcomes = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined?;
        stats.record(&outcome);
        if let Some(f) = &on_outcome {
            f(&outcome);
        }
        outcomes.push(outcome);
    }

    let mut summary = RunSummary::from_outcomes(&outcomes);
    summary.unlogged = runner.unlogged_outcomes();
    runner
        .sink()
        .append_block(&summary.render_block(&runner.target().label()))
        .await?;

    tracing::info!(
        batch = %runner.target().label(),
        total = summary.total,
        successes = summary.successes,
        failures = summary.failures,
        "batch finished"
    );

    Ok(summary)
}

/// Spawn `launch(1..=count)`; invocation `i` (zero-based) waits `i * stagger` before it starts.
fn spawn_staggered<T, F, Fut>(count: u64, stagger: Duration, mut launch: F) -> JoinSet<T>
where
    T: Send + 'static,
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for i in 0..count {
        let delay = stagger.saturating_mul(u32::try_from(i).unwrap_or(u32::MAX));
        let fut = launch(i + 1);
        tasks.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            fut.await
        });
    }
    tasks
}
