use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use gwload_core::{
    AttemptErrorKind, BatchFn, BatchReport, CallType, Gateway, HttpClient, LogSink, Outcome,
    OutcomeFn, Payload, PayloadOptions, PlanConfig, Prompts, RequestTarget, RetryPolicy, Runner,
    RunnerArgs, StatsBoard, run_batch, run_plan,
};
use gwload_testserver::{FAKE_PNG, TestServer, TestServerConfig};

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_delay: Duration::from_millis(20),
    }
}

async fn runner(
    base_url: &str,
    call_type: CallType,
    endpoint: &str,
    policy: RetryPolicy,
    timeout: Duration,
    dir: &Path,
) -> anyhow::Result<Arc<Runner>> {
    let target = RequestTarget {
        gateway: Gateway::new("gateway1", base_url)?,
        call_type,
        endpoint: endpoint.to_string(),
    };
    let sink = Arc::new(LogSink::open(dir.join(format!("{}.log", target.label()))).await?);
    let args = RunnerArgs {
        payload: Payload::build(call_type, &Prompts::default(), &PayloadOptions::default()),
        target,
        policy,
        timeout,
        image_dir: dir.join("images"),
    };
    Ok(Arc::new(Runner::new(HttpClient::default(), args, sink)?))
}

#[tokio::test]
async fn permanently_failing_endpoint_exhausts_retries() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let r = runner(
        server.base_url(),
        CallType::Llm,
        "fail",
        policy(3),
        Duration::from_secs(5),
        dir.path(),
    )
    .await?;

    let outcome = r.run(1).await;
    assert!(!outcome.success);
    assert_eq!(outcome.retry_count, 3);
    assert_eq!(outcome.status_code, Some(500));
    assert_eq!(outcome.error, Some(AttemptErrorKind::HttpStatus));
    assert!(outcome.duration >= Duration::from_millis(60));
    assert_eq!(server.stats().requests_total(), 4);

    let log = tokio::fs::read_to_string(r.sink().path()).await?;
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1, "log:\n{log}");
    assert!(lines[0].contains("FAILED after 3 retries"), "log:\n{log}");

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn fails_twice_then_succeeds() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerConfig {
        fail_first: 2,
        ..TestServerConfig::default()
    })
    .await
    .context("start test server")?;
    let dir = tempfile::tempdir()?;
    let r = runner(
        server.base_url(),
        CallType::Llm,
        "llm",
        policy(3),
        Duration::from_secs(5),
        dir.path(),
    )
    .await?;

    let outcome = r.run(1).await;
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.retry_count, 2);
    assert_eq!(outcome.status_code, Some(200));
    assert!(outcome.duration >= Duration::from_millis(40));
    assert_eq!(server.stats().failed_responses(), 2);
    assert_eq!(server.stats().llm_requests(), 3);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn batch_of_ten_all_succeed() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let r = runner(
        server.base_url(),
        CallType::Llm,
        "llm",
        policy(3),
        Duration::from_secs(5),
        dir.path(),
    )
    .await?;

    let board = StatsBoard::new();
    let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_cb = seen.clone();
    let on_outcome: OutcomeFn = Arc::new(move |o: &Outcome| {
        if let Ok(mut v) = seen_cb.lock() {
            v.push(o.index);
        }
    });

    let summary = run_batch(
        10,
        Duration::ZERO,
        r.clone(),
        board.handle("gateway1", CallType::Llm),
        Some(on_outcome),
    )
    .await?;

    assert_eq!(summary.total, 10);
    assert_eq!(summary.successes, 10);
    assert_eq!(summary.failures, 0);
    assert_eq!(summary.total_retries, 0);

    let mut indices = seen.lock().map_err(|_| anyhow::anyhow!("poisoned"))?.clone();
    indices.sort_unstable();
    assert_eq!(indices, (1..=10).collect::<Vec<u64>>());

    let rows = board.snapshot();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].success, 10);

    assert_eq!(server.stats().saw_event_stream_accept(), 10);
    assert_eq!(server.stats().saw_json_content_type(), 10);

    let log = tokio::fs::read_to_string(r.sink().path()).await?;
    assert_eq!(log.lines().filter(|l| l.contains("succeeded")).count(), 10);
    assert!(log.contains("--- summary: gateway1_llm ---"));
    assert!(log.trim_end().ends_with("ms"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn staggered_batch_excludes_launch_delay_from_durations() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let r = runner(
        server.base_url(),
        CallType::Llm,
        "llm",
        policy(0),
        Duration::from_secs(5),
        dir.path(),
    )
    .await?;

    let outcomes: Arc<Mutex<Vec<Outcome>>> = Arc::new(Mutex::new(Vec::new()));
    let outcomes_cb = outcomes.clone();
    let on_outcome: OutcomeFn = Arc::new(move |o: &Outcome| {
        if let Ok(mut v) = outcomes_cb.lock() {
            v.push(o.clone());
        }
    });

    let started = std::time::Instant::now();
    let summary = run_batch(
        4,
        Duration::from_millis(200),
        r,
        StatsBoard::new().handle("gateway1", CallType::Llm),
        Some(on_outcome),
    )
    .await?;
    let elapsed = started.elapsed();
    server.shutdown().await;

    assert_eq!(summary.successes, 4);
    assert!(elapsed >= Duration::from_millis(600), "batch took {elapsed:?}");

    let outcomes = outcomes.lock().map_err(|_| anyhow::anyhow!("poisoned"))?.clone();
    let last = outcomes
        .iter()
        .find(|o| o.index == 4)
        .context("outcome of request 4")?;
    assert!(
        last.duration < Duration::from_millis(600),
        "request 4 duration includes its launch delay: {:?}",
        last.duration
    );
    Ok(())
}

#[tokio::test]
async fn image_success_saves_every_returned_image() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerConfig {
        images_per_response: 2,
        ..TestServerConfig::default()
    })
    .await
    .context("start test server")?;
    let dir = tempfile::tempdir()?;
    let r = runner(
        server.base_url(),
        CallType::Image,
        "text-to-image",
        policy(1),
        Duration::from_secs(5),
        dir.path(),
    )
    .await?;

    let outcome = r.run(7).await;
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.images_saved, 2);
    assert_eq!(server.stats().image_fetches(), 2);

    for i in 0..2 {
        let path = dir.path().join(format!("images/gateway1_req7_{i}.png"));
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        assert_eq!(bytes, FAKE_PNG);
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn broken_image_link_does_not_fail_the_request() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerConfig {
        image_url_prefix: "/missing".to_string(),
        ..TestServerConfig::default()
    })
    .await
    .context("start test server")?;
    let dir = tempfile::tempdir()?;
    let r = runner(
        server.base_url(),
        CallType::Image,
        "text-to-image",
        policy(2),
        Duration::from_secs(5),
        dir.path(),
    )
    .await?;

    let outcome = r.run(1).await;
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.retry_count, 0);
    assert_eq!(outcome.images_saved, 0);
    assert_eq!(server.stats().image_requests(), 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn slow_attempts_time_out_and_count_as_failures() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let r = runner(
        server.base_url(),
        CallType::Llm,
        "slow",
        policy(1),
        Duration::from_millis(50),
        dir.path(),
    )
    .await?;

    let outcome = r.run(1).await;
    assert!(!outcome.success);
    assert_eq!(outcome.retry_count, 1);
    assert_eq!(outcome.error, Some(AttemptErrorKind::Timeout));
    assert_eq!(outcome.status_code, None);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn dual_gateway_plan_reports_every_batch() -> anyhow::Result<()> {
    let gw1 = TestServer::start().await.context("start gateway 1")?;
    let gw2 = TestServer::start_with(TestServerConfig {
        fail_first: 100,
        ..TestServerConfig::default()
    })
    .await
    .context("start gateway 2")?;
    let dir = tempfile::tempdir()?;

    let cfg = PlanConfig {
        gateways: vec![
            Gateway::new("gateway1", gw1.base_url())?,
            Gateway::new("gateway2", gw2.base_url())?,
        ],
        call_types: vec![CallType::Llm, CallType::Image],
        llm_endpoint: "llm".to_string(),
        image_endpoint: "text-to-image".to_string(),
        concurrency: 3,
        stagger: Duration::ZERO,
        policy: policy(1),
        timeout: Duration::from_secs(5),
        prompts: Prompts::default(),
        payload: PayloadOptions::default(),
        log_dir: dir.path().join("logs"),
        image_dir: dir.path().join("output/run"),
        run_id: "test-run".to_string(),
    };

    let report = run_plan(&cfg, HttpClient::default(), None, None).await?;
    assert_eq!(report.batches.len(), 4);

    for batch in &report.batches {
        let s = batch.summary;
        assert_eq!(s.successes + s.failures, 3);
        assert!(batch.log_path.exists(), "missing {}", batch.log_path.display());
        if batch.target.gateway.name() == "gateway1" {
            assert_eq!(s.successes, 3, "{}", batch.target.label());
        } else {
            assert_eq!(s.failures, 3, "{}", batch.target.label());
            assert_eq!(s.total_retries, 3);
        }
    }

    assert_eq!(report.stats.len(), 4);
    let total: u64 = report.stats.iter().map(|r| r.total).sum();
    assert_eq!(total, 12);

    let images = std::fs::read_dir(dir.path().join("output/run"))?.count();
    assert_eq!(images, 3);

    gw1.shutdown().await;
    gw2.shutdown().await;
    Ok(())
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn failed_log_append_is_counted_not_dropped() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let target = RequestTarget {
        gateway: Gateway::new("gateway1", server.base_url())?,
        call_type: CallType::Llm,
        endpoint: "llm".to_string(),
    };
    // Every write to /dev/full fails with ENOSPC.
    let sink = Arc::new(LogSink::open("/dev/full").await?);
    let args = RunnerArgs {
        payload: Payload::build(CallType::Llm, &Prompts::default(), &PayloadOptions::default()),
        target,
        policy: policy(0),
        timeout: Duration::from_secs(5),
        image_dir: std::env::temp_dir(),
    };
    let runner = Runner::new(HttpClient::default(), args, sink)?;

    let outcome = runner.run(1).await;
    let second = runner.run(2).await;
    server.shutdown().await;

    assert!(outcome.success && second.success);
    assert_eq!(runner.unlogged_outcomes(), 2);
    Ok(())
}

#[tokio::test]
async fn batch_reports_arrive_as_each_batch_finishes() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;

    let cfg = PlanConfig {
        gateways: vec![Gateway::new("gateway1", server.base_url())?],
        call_types: vec![CallType::Llm, CallType::Image],
        // The LLM batch answers after the slow route's delay; the image batch right away.
        llm_endpoint: "slow".to_string(),
        image_endpoint: "text-to-image".to_string(),
        concurrency: 2,
        stagger: Duration::ZERO,
        policy: policy(0),
        timeout: Duration::from_secs(5),
        prompts: Prompts::default(),
        payload: PayloadOptions::default(),
        log_dir: dir.path().join("logs"),
        image_dir: dir.path().join("output/run"),
        run_id: "test-run".to_string(),
    };

    let finished: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let finished_cb = finished.clone();
    let on_batch: BatchFn = Arc::new(move |b: &BatchReport| {
        if let Ok(mut v) = finished_cb.lock() {
            v.push(b.target.label());
        }
    });

    let report = run_plan(&cfg, HttpClient::default(), None, Some(on_batch)).await?;
    server.shutdown().await;

    let finished = finished.lock().map_err(|_| anyhow::anyhow!("poisoned"))?.clone();
    assert_eq!(finished, vec!["gateway1_image", "gateway1_llm"]);

    let ordered: Vec<String> = report.batches.iter().map(|b| b.target.label()).collect();
    assert_eq!(ordered, vec!["gateway1_llm", "gateway1_image"]);
    Ok(())
}
