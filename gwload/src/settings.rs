//! Flag / environment / default resolution.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context as _;
use gwload_core::{CallType, Gateway, PayloadOptions, PlanConfig, Prompts, RetryPolicy};

use crate::cli::{Cli, TestKind};

pub(crate) type EnvMap = BTreeMap<String, String>;

pub(crate) const DEFAULT_CONCURRENCY: u64 = 10;
pub(crate) const DEFAULT_LLM_ENDPOINT: &str = "llm";
pub(crate) const DEFAULT_IMAGE_ENDPOINT: &str = "text-to-image";
pub(crate) const DEFAULT_LOG_DIR: &str = "logs";
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub test: TestKind,
    pub concurrency: u64,
    pub gateway1_url: String,
    pub gateway2_url: Option<String>,
    pub llm_endpoint: String,
    pub image_endpoint: String,
    pub policy: RetryPolicy,
    pub timeout: Duration,
    pub stagger: Duration,
    pub prompts_file: Option<PathBuf>,
    pub payload: PayloadOptions,
    pub log_dir: PathBuf,
    pub output_dir: PathBuf,
}

pub(crate) fn process_env() -> EnvMap {
    std::env::vars().collect()
}

impl Settings {
    pub(crate) fn resolve(args: &Cli, env: &EnvMap) -> anyhow::Result<Self> {
        let gateway1_url = args
            .gateway1_url
            .clone()
            .or_else(|| env_value(env, "GATEWAY_1_URL"))
            .or_else(|| env_value(env, "LIVEPEER_GATEWAY_URL"))
            .context(
                "missing gateway url: pass --gateway1Url or set GATEWAY_1_URL (or LIVEPEER_GATEWAY_URL)",
            )?;
        let gateway2_url = args
            .gateway2_url
            .clone()
            .or_else(|| env_value(env, "GATEWAY_2_URL"));

        let test = match args.test {
            Some(t) => t,
            None => match env_value(env, "TEST_TYPE") {
                Some(v) => <TestKind as clap::ValueEnum>::from_str(&v, true)
                    .map_err(|_| anyhow::anyhow!("invalid TEST_TYPE `{v}` (expected llm, image or all)"))?,
                None => TestKind::All,
            },
        };

        let concurrency = match args.concurrency {
            Some(n) => n,
            None => env_parse(env, "TOTAL_REQUESTS")?.unwrap_or(DEFAULT_CONCURRENCY),
        };
        if concurrency == 0 {
            anyhow::bail!("concurrency must be a positive integer");
        }

        let defaults = RetryPolicy::default();
        let retry_delay = match args.retry_delay {
            Some(d) => d,
            None => env_parse::<u64>(env, "RETRY_DELAY_MS")?
                .map_or(defaults.retry_delay, Duration::from_millis),
        };
        let max_retries = match args.max_retries {
            Some(n) => n,
            None => env_parse(env, "MAX_RETRIES")?.unwrap_or(defaults.max_retries),
        };
        let timeout = match args.timeout {
            Some(d) => d,
            None => env_parse::<u64>(env, "REQUEST_TIMEOUT_MS")?
                .map_or(gwload_core::runner::DEFAULT_ATTEMPT_TIMEOUT, Duration::from_millis),
        };
        if timeout.is_zero() {
            anyhow::bail!("timeout must be greater than zero");
        }

        let payload_defaults = PayloadOptions::default();
        let payload = PayloadOptions {
            llm_model: args.llm_model.clone().unwrap_or(payload_defaults.llm_model),
            max_tokens: args.max_tokens.unwrap_or(payload_defaults.max_tokens),
            image_model: args
                .image_model
                .clone()
                .unwrap_or(payload_defaults.image_model),
            width: args.width.unwrap_or(payload_defaults.width),
            height: args.height.unwrap_or(payload_defaults.height),
        };

        Ok(Self {
            test,
            concurrency,
            gateway1_url,
            gateway2_url,
            llm_endpoint: args
                .llm_endpoint
                .clone()
                .or_else(|| env_value(env, "LLM_GATEWAY_ENDPOINT"))
                .unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string()),
            image_endpoint: args
                .image_endpoint
                .clone()
                .or_else(|| env_value(env, "IMAGE_GATEWAY_ENDPOINT"))
                .unwrap_or_else(|| DEFAULT_IMAGE_ENDPOINT.to_string()),
            policy: RetryPolicy {
                max_retries,
                retry_delay,
            },
            timeout,
            stagger: args.stagger.unwrap_or(Duration::ZERO),
            prompts_file: args
                .prompts
                .clone()
                .or_else(|| env_value(env, "PROMPTS_FILE").map(PathBuf::from)),
            payload,
            log_dir: args
                .log_dir
                .clone()
                .or_else(|| env_value(env, "LOG_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            output_dir: args
                .output_dir
                .clone()
                .or_else(|| env_value(env, "OUTPUT_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        })
    }

    pub(crate) fn call_types(&self) -> Vec<CallType> {
        match self.test {
            TestKind::Llm => vec![CallType::Llm],
            TestKind::Image => vec![CallType::Image],
            TestKind::All => vec![CallType::Llm, CallType::Image],
        }
    }

    pub(crate) fn gateways(&self) -> Result<Vec<Gateway>, gwload_core::Error> {
        let mut out = vec![Gateway::new("gateway1", &self.gateway1_url)?];
        if let Some(url) = &self.gateway2_url {
            out.push(Gateway::new("gateway2", url)?);
        }
        Ok(out)
    }

    pub(crate) fn into_plan(
        self,
        prompts: Prompts,
        run_id: String,
    ) -> Result<PlanConfig, gwload_core::Error> {
        Ok(PlanConfig {
            gateways: self.gateways()?,
            call_types: self.call_types(),
            llm_endpoint: self.llm_endpoint,
            image_endpoint: self.image_endpoint,
            concurrency: self.concurrency,
            stagger: self.stagger,
            policy: self.policy,
            timeout: self.timeout,
            prompts,
            payload: self.payload,
            log_dir: self.log_dir,
            image_dir: self.output_dir.join(&run_id),
            run_id,
        })
    }
}

fn env_value(env: &EnvMap, key: &str) -> Option<String> {
    env.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn env_parse<T>(env: &EnvMap, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env_value(env, key)
        .map(|v| {
            v.parse::<T>()
                .map_err(|err| anyhow::anyhow!("invalid {key} `{v}`: {err}"))
        })
        .transpose()
}
