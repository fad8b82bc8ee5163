use std::future::Future;
use std::time::Duration;

use super::outcome::AttemptErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Fixed pause between a failed attempt and the next one.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub kind: AttemptErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl AttemptFailure {
    pub fn status(status: u16, body: Option<&str>) -> Self {
        let message = match body.map(str::trim).filter(|b| !b.is_empty()) {
            Some(b) => format!("http status {status}: {}", truncate(b, 200)),
            None => format!("http status {status}"),
        };
        Self {
            kind: AttemptErrorKind::HttpStatus,
            status: Some(status),
            message,
        }
    }

    pub fn transport(err: &gwload_http::Error) -> Self {
        let kind = if err.is_timeout() {
            AttemptErrorKind::Timeout
        } else {
            AttemptErrorKind::Transport
        };
        Self {
            kind,
            status: None,
            message: err.to_string(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T, AttemptFailure>,
    /// Retries performed; never exceeds `RetryPolicy::max_retries`.
    pub retry_count: u32,
}

/// Drive `attempt` until it succeeds or the retry budget is spent.
///
/// `attempt` receives the zero-based attempt number. The delay is slept between attempts only,
/// never after the last one.
pub async fn run_with_retry<T, F, Fut>(policy: RetryPolicy, mut attempt: F) -> Retried<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let mut retries = 0u32;
    loop {
        match attempt(retries).await {
            Ok(value) => {
                return Retried {
                    result: Ok(value),
                    retry_count: retries,
                };
            }
            Err(failure) if retries >= policy.max_retries => {
                return Retried {
                    result: Err(failure),
                    retry_count: retries,
                };
            }
            Err(failure) => {
                tracing::debug!(
                    attempt = retries + 1,
                    kind = %failure.kind,
                    error = %failure.message,
                    "attempt failed, retrying in {:?}",
                    policy.retry_delay
                );
                retries += 1;
                tokio::time::sleep(policy.retry_delay).await;
            }
        }
    }
}
