use serde::Serialize;
use std::io::Write as _;
use std::sync::Arc;

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _plan: &gwload_core::PlanConfig) {}

    fn on_outcome(&self) -> Option<gwload_core::OutcomeFn> {
        Some(Arc::new(|o: &gwload_core::Outcome| {
            emit_json_line(&build_outcome_line(o));
        }))
    }

    fn on_batch(&self) -> Option<gwload_core::BatchFn> {
        Some(Arc::new(|b: &gwload_core::BatchReport| {
            emit_json_line(&build_summary_line(b));
        }))
    }

    fn print_report(&self, report: &gwload_core::PlanReport) -> anyhow::Result<()> {
        for row in &report.stats {
            emit_json_line(&build_stats_line(row));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonOutcomeLine {
    pub kind: &'static str,
    pub gateway: String,
    pub call_type: String,
    pub request: u64,
    pub success: bool,
    pub duration_ms: u64,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub images_saved: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub gateway: String,
    pub call_type: String,
    pub url: String,
    pub log_path: String,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_retries: u64,
    pub avg_duration_ms: u64,
    pub unlogged: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonStatsLine {
    pub kind: &'static str,
    pub gateway: String,
    pub call_type: String,
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub retries: u64,
    pub avg_duration_ms: u64,
}

fn build_outcome_line(o: &gwload_core::Outcome) -> JsonOutcomeLine {
    JsonOutcomeLine {
        kind: "outcome",
        gateway: o.gateway.clone(),
        call_type: o.call_type.to_string(),
        request: o.index,
        success: o.success,
        duration_ms: o.duration_ms(),
        retry_count: o.retry_count,
        status_code: o.status_code,
        error: o.error.map(|e| e.to_string()),
        error_message: o.error_message.clone(),
        images_saved: o.images_saved,
    }
}

fn build_summary_line(batch: &gwload_core::BatchReport) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        gateway: batch.target.gateway.name().to_string(),
        call_type: batch.target.call_type.to_string(),
        url: batch.target.url(),
        log_path: batch.log_path.display().to_string(),
        total: batch.summary.total,
        successful: batch.summary.successes,
        failed: batch.summary.failures,
        total_retries: batch.summary.total_retries,
        avg_duration_ms: batch.summary.avg_duration_ms(),
        unlogged: batch.summary.unlogged,
    }
}

fn build_stats_line(row: &gwload_core::StatsRow) -> JsonStatsLine {
    JsonStatsLine {
        kind: "stats",
        gateway: row.key.gateway.clone(),
        call_type: row.key.call_type.to_string(),
        total: row.total,
        success: row.success,
        failure: row.failure,
        retries: row.retries,
        avg_duration_ms: row.avg_duration_ms,
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwload_core::{AttemptErrorKind, CallType, Outcome};
    use serde_json::Value;
    use std::time::Duration;

    #[test]
    fn failed_outcome_line_carries_reason() {
        let outcome = Outcome {
            index: 7,
            gateway: "gateway2".to_string(),
            call_type: CallType::Image,
            success: false,
            duration: Duration::from_millis(3021),
            retry_count: 3,
            status_code: Some(503),
            error: Some(AttemptErrorKind::HttpStatus),
            error_message: Some("HTTP 503: busy".to_string()),
            images_saved: 0,
        };

        let v: Value = match serde_json::to_value(build_outcome_line(&outcome)) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };
        assert_eq!(v.get("kind").and_then(Value::as_str), Some("outcome"));
        assert_eq!(v.get("call_type").and_then(Value::as_str), Some("image"));
        assert_eq!(v.get("request").and_then(Value::as_u64), Some(7));
        assert_eq!(v.get("retry_count").and_then(Value::as_u64), Some(3));
        assert_eq!(v.get("error").and_then(Value::as_str), Some("http_status"));
        assert_eq!(v.get("duration_ms").and_then(Value::as_u64), Some(3021));
    }

    #[test]
    fn successful_outcome_line_omits_error_fields() {
        let outcome = Outcome {
            index: 1,
            gateway: "gateway1".to_string(),
            call_type: CallType::Llm,
            success: true,
            duration: Duration::from_millis(80),
            retry_count: 0,
            status_code: Some(200),
            error: None,
            error_message: None,
            images_saved: 0,
        };

        let v: Value = match serde_json::to_value(build_outcome_line(&outcome)) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };
        assert!(v.get("error").is_none());
        assert!(v.get("error_message").is_none());
        assert_eq!(v.get("status_code").and_then(Value::as_u64), Some(200));
    }
}
