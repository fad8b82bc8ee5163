//! Bounded-retry request runner.
//!
//! One [`Runner`] serves one batch: it owns the encoded payload and target, and every call to
//! [`Runner::run`] performs one logical request (first attempt plus retries) to a terminal
//! [`Outcome`], which is appended to the batch log before it is returned.

mod images;
mod outcome;
mod retry;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use gwload_http::{HttpClient, HttpRequest, HttpResponse};
use tokio::time::Instant;

pub use outcome::{AttemptErrorKind, Outcome};
pub use retry::{AttemptFailure, Retried, RetryPolicy, run_with_retry};

use crate::call::{CallType, RequestTarget};
use crate::error::Result;
use crate::log_sink::LogSink;
use crate::payload::Payload;

/// Per-attempt upper bound when none is configured.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct RunnerArgs {
    pub target: RequestTarget,
    pub payload: Payload,
    pub policy: RetryPolicy,
    /// Bound on a single attempt (and on each image fetch).
    pub timeout: Duration,
    /// Where image call types persist fetched images.
    pub image_dir: PathBuf,
}

#[derive(Debug)]
pub struct Runner {
    client: HttpClient,
    args: RunnerArgs,
    url: String,
    body: Bytes,
    sink: Arc<LogSink>,
    unlogged: AtomicU64,
}

impl Runner {
    pub fn new(client: HttpClient, args: RunnerArgs, sink: Arc<LogSink>) -> Result<Self> {
        let body = Bytes::from(args.payload.to_json()?);
        let url = args.target.url();
        Ok(Self {
            client,
            args,
            url,
            body,
            sink,
            unlogged: AtomicU64::new(0),
        })
    }

    pub fn target(&self) -> &RequestTarget {
        &self.args.target
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    /// Outcome lines that could not be appended to the batch log.
    pub fn unlogged_outcomes(&self) -> u64 {
        self.unlogged.load(Ordering::Relaxed)
    }

    pub async fn run(&self, index: u64) -> Outcome {
        let started = Instant::now();
        let retried = run_with_retry(self.args.policy, |attempt| self.attempt(index, attempt)).await;

        let mut outcome = Outcome {
            index,
            gateway: self.args.target.gateway.name().to_string(),
            call_type: self.args.target.call_type,
            success: false,
            duration: Duration::ZERO,
            retry_count: retried.retry_count,
            status_code: None,
            error: None,
            error_message: None,
            images_saved: 0,
        };

        match retried.result {
            Ok(res) => {
                outcome.success = true;
                outcome.status_code = Some(res.status);
                if self.args.target.call_type == CallType::Image {
                    outcome.images_saved = images::save_images(
                        &self.client,
                        &self.args.target.gateway,
                        &res,
                        &self.args.image_dir,
                        index,
                        self.args.timeout,
                    )
                    .await;
                }
            }
            Err(failure) => {
                outcome.status_code = failure.status;
                outcome.error = Some(failure.kind);
                outcome.error_message = Some(failure.message);
            }
        }
        outcome.duration = started.elapsed();

        if let Err(err) = self.sink.append_line(&outcome.log_line()).await {
            self.unlogged.fetch_add(1, Ordering::Relaxed);
            tracing::error!(request = index, "{err}");
        }

        outcome
    }

    async fn attempt(&self, index: u64, attempt: u32) -> std::result::Result<HttpResponse, AttemptFailure> {
        tracing::debug!(
            request = index,
            attempt = attempt + 1,
            url = %self.url,
            "sending {} request",
            self.args.target.call_type
        );

        let mut req = HttpRequest::post(&self.url, self.body.clone())
            .with_header("content-type", "application/json")
            .with_timeout(self.args.timeout);
        for (name, value) in self.args.payload.extra_headers() {
            req = req.with_header(name, value);
        }

        match self.client.request(req).await {
            Ok(res) if res.is_success() => Ok(res),
            Ok(res) => Err(AttemptFailure::status(res.status, res.body_utf8())),
            Err(err) => Err(AttemptFailure::transport(&err)),
        }
    }
}
