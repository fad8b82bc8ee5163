use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gwload_http::HttpClient;
use tokio::task::JoinSet;

use crate::batch::{OutcomeFn, run_batch};
use crate::call::{CallType, Gateway, RequestTarget};
use crate::error::{Error, Result};
use crate::log_sink::LogSink;
use crate::payload::{Payload, PayloadOptions};
use crate::prompt::Prompts;
use crate::runner::{RetryPolicy, Runner, RunnerArgs};
use crate::stats::{StatsBoard, StatsRow};
use crate::summary::RunSummary;

/// Everything one process run executes: a batch per gateway and call type.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    pub gateways: Vec<Gateway>,
    pub call_types: Vec<CallType>,
    pub llm_endpoint: String,
    pub image_endpoint: String,
    /// Requests per batch.
    pub concurrency: u64,
    pub stagger: Duration,
    pub policy: RetryPolicy,
    pub timeout: Duration,
    pub prompts: Prompts,
    pub payload: PayloadOptions,
    pub log_dir: PathBuf,
    pub image_dir: PathBuf,
    /// Filesystem-safe run identifier used in log file names.
    pub run_id: String,
}

impl PlanConfig {
    /// Targets ordered gateway-major, in configuration order.
    pub fn targets(&self) -> Vec<RequestTarget> {
        self.gateways
            .iter()
            .flat_map(|gateway| {
                self.call_types.iter().map(move |&call_type| RequestTarget {
                    gateway: gateway.clone(),
                    call_type,
                    endpoint: match call_type {
                        CallType::Llm => self.llm_endpoint.clone(),
                        CallType::Image => self.image_endpoint.clone(),
                    },
                })
            })
            .collect()
    }

    pub fn log_path(&self, target: &RequestTarget) -> PathBuf {
        self.log_dir
            .join(format!("{}_{}.log", target.label(), self.run_id))
    }
}

/// Observer invoked once per finished batch, in completion order.
pub type BatchFn = Arc<dyn Fn(&BatchReport) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub target: RequestTarget,
    pub log_path: PathBuf,
    pub summary: RunSummary,
}

#[derive(Debug, Clone)]
pub struct PlanReport {
    /// In the order of [`PlanConfig::targets`].
    pub batches: Vec<BatchReport>,
    pub stats: Vec<StatsRow>,
}

/// Run every batch of the plan concurrently.
///
/// All log files are opened before the first request goes out, so an unwritable log directory
/// fails the run without touching the gateways.
pub async fn run_plan(
    cfg: &PlanConfig,
    client: HttpClient,
    on_outcome: Option<OutcomeFn>,
    on_batch: Option<BatchFn>,
) -> Result<PlanReport> {
    if cfg.concurrency == 0 {
        return Err(Error::InvalidConcurrency);
    }

    let board = StatsBoard::new();

    let mut runners = Vec::new();
    for target in cfg.targets() {
        let sink = Arc::new(LogSink::open(cfg.log_path(&target)).await?);
        let payload = Payload::build(target.call_type, &cfg.prompts, &cfg.payload);
        let stats = board.handle(target.gateway.name(), target.call_type);
        let args = RunnerArgs {
            target,
            payload,
            policy: cfg.policy,
            timeout: cfg.timeout,
            image_dir: cfg.image_dir.clone(),
        };
        runners.push((Arc::new(Runner::new(client.clone(), args, sink)?), stats));
    }

    let mut batches = JoinSet::new();
    for (pos, (runner, stats)) in runners.into_iter().enumerate() {
        let on_outcome = on_outcome.clone();
        let count = cfg.concurrency;
        let stagger = cfg.stagger;
        batches.spawn(async move {
            tracing::info!(batch = %runner.target().label(), count, "batch started");
            let summary = run_batch(count, stagger, runner.clone(), stats, on_outcome).await;
            (pos, runner, summary)
        });
    }

    let mut reports = Vec::new();
    while let Some(joined) = batches.join_next().await {
        let (pos, runner, summary) = joined?;
        let report = BatchReport {
            target: runner.target().clone(),
            log_path: runner.sink().path().to_path_buf(),
            summary: summary?,
        };
        if let Some(f) = &on_batch {
            f(&report);
        }
        reports.push((pos, report));
    }
    reports.sort_by_key(|(pos, _)| *pos);

    Ok(PlanReport {
        batches: reports.into_iter().map(|(_, r)| r).collect(),
        stats: board.snapshot(),
    })
}
