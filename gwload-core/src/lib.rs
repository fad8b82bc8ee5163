#![forbid(unsafe_code)]

mod batch;
mod call;
mod error;
mod log_sink;
mod payload;
mod plan;
mod prompt;
mod stats;
mod summary;

pub mod runner;

pub use batch::{OutcomeFn, run_batch};
pub use call::{CallType, Gateway, RequestTarget};
pub use error::{Error, Result};
pub use log_sink::LogSink;
pub use payload::{ChatMessage, ImageRef, ImageRequest, ImageResponse, LlmRequest, Payload, PayloadOptions};
pub use plan::{BatchFn, BatchReport, PlanConfig, PlanReport, run_plan};
pub use prompt::{IMG_PROMPT_KEY, LLM_PROMPT_KEY, PromptError, Prompts};
pub use runner::{AttemptErrorKind, Outcome, RetryPolicy, Runner, RunnerArgs};
pub use stats::{StatsBoard, StatsHandle, StatsKey, StatsRow};
pub use summary::RunSummary;

pub use gwload_http::HttpClient;
