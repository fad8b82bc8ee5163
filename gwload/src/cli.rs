use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub(crate) fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Outcome lines, summaries and a progress bar.
    HumanReadable,
    /// Emit NDJSON lines (outcomes, summaries, stats) to stdout.
    Json,
}

/// Which generation calls to exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TestKind {
    Llm,
    Image,
    All,
}

#[derive(Debug, Parser)]
#[command(
    name = "gwload",
    author,
    version,
    about = "Concurrent load generator for LLM and image generation gateways",
    long_about = "gwload fires a batch of concurrent requests at one or two generation gateways, retries failed calls a bounded number of times and writes one log file per gateway and call type.\n\nFlags take precedence over environment variables, which take precedence over built-in defaults.",
    after_help = "Environment:\n  GATEWAY_1_URL, LIVEPEER_GATEWAY_URL, GATEWAY_2_URL, TOTAL_REQUESTS, RETRY_DELAY_MS,\n  MAX_RETRIES, REQUEST_TIMEOUT_MS, LLM_GATEWAY_ENDPOINT, IMAGE_GATEWAY_ENDPOINT,\n  TEST_TYPE, PROMPTS_FILE, LOG_DIR, OUTPUT_DIR\n\nExamples:\n  gwload --gateway1Url https://gw.example --test llm --concurrency 20\n  gwload --gateway1Url https://a.example --gateway2Url https://b.example --prompts prompts.txt"
)]
pub struct Cli {
    /// Call types to exercise
    #[arg(long, value_enum, value_name = "KIND")]
    pub test: Option<TestKind>,

    /// Requests per gateway and call type, all launched at once
    #[arg(long)]
    pub concurrency: Option<u64>,

    /// Base URL of the first (or only) gateway
    #[arg(long = "gateway1Url", visible_alias = "gateway1-url", value_name = "URL")]
    pub gateway1_url: Option<String>,

    /// Base URL of a second gateway to load in parallel
    #[arg(long = "gateway2Url", visible_alias = "gateway2-url", value_name = "URL")]
    pub gateway2_url: Option<String>,

    /// Path of the LLM endpoint, relative to the gateway URL
    #[arg(long = "llmEndpoint", visible_alias = "llm-endpoint", value_name = "PATH")]
    pub llm_endpoint: Option<String>,

    /// Path of the image endpoint, relative to the gateway URL
    #[arg(long = "imageEndpoint", visible_alias = "image-endpoint", value_name = "PATH")]
    pub image_endpoint: Option<String>,

    /// Retries after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Pause between attempts (e.g. 1000ms, 2s)
    #[arg(long, value_parser = parse_duration)]
    pub retry_delay: Option<Duration>,

    /// Upper bound on a single attempt (e.g. 300s, 5m)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Delay between launching consecutive requests of a batch
    #[arg(long, value_parser = parse_duration)]
    pub stagger: Option<Duration>,

    /// Prompt file with `llm_prompt=` and `img_prompt=` keys
    #[arg(long, value_name = "FILE")]
    pub prompts: Option<PathBuf>,

    /// Model used for LLM calls
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Model used for image calls
    #[arg(long)]
    pub image_model: Option<String>,

    /// `max_tokens` sent with LLM calls
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Image width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Directory for the per-gateway outcome logs
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Directory for fetched images (a per-run subdirectory is created)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Enable debug diagnostics on stderr (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("300"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn cli_accepts_camel_case_flags() {
        let parsed = Cli::try_parse_from([
            "gwload",
            "--test",
            "image",
            "--concurrency",
            "5",
            "--gateway1Url",
            "https://gw1.example",
            "--gateway2Url",
            "https://gw2.example",
            "--llmEndpoint",
            "llm",
            "--imageEndpoint",
            "text-to-image",
            "--retry-delay",
            "2s",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        assert_eq!(cli.test, Some(TestKind::Image));
        assert_eq!(cli.concurrency, Some(5));
        assert_eq!(cli.gateway1_url.as_deref(), Some("https://gw1.example"));
        assert_eq!(cli.gateway2_url.as_deref(), Some("https://gw2.example"));
        assert_eq!(cli.llm_endpoint.as_deref(), Some("llm"));
        assert_eq!(cli.image_endpoint.as_deref(), Some("text-to-image"));
        assert_eq!(cli.retry_delay, Some(Duration::from_secs(2)));
        assert!(matches!(cli.output, OutputFormat::HumanReadable));
    }

    #[test]
    fn cli_accepts_kebab_case_aliases() {
        let parsed = Cli::try_parse_from([
            "gwload",
            "--gateway1-url",
            "http://127.0.0.1:8935",
            "--image-endpoint",
            "img",
            "--output",
            "json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        assert_eq!(cli.gateway1_url.as_deref(), Some("http://127.0.0.1:8935"));
        assert_eq!(cli.image_endpoint.as_deref(), Some("img"));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.test, None);
    }

    #[test]
    fn cli_rejects_unknown_test_kind() {
        assert!(Cli::try_parse_from(["gwload", "--test", "video"]).is_err());
    }
}
