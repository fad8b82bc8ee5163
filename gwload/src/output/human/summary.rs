use std::fmt::Write as _;
use std::time::Duration;

use super::format::{format_duration_single, format_percent};

/// Summary block of one finished batch followed by its log path.
pub(crate) fn render_batch(batch: &gwload_core::BatchReport) -> String {
    let mut out = batch.summary.render_block(&batch.target.label());
    writeln!(&mut out, "log: {}", batch.log_path.display()).ok();
    out
}

pub(crate) fn render_stats(rows: &[gwload_core::StatsRow]) -> String {
    let mut out = String::new();
    if rows.is_empty() {
        out.push_str("stats: no batches\n");
        return out;
    }

    out.push_str("stats\n");
    writeln!(
        &mut out,
        "  {:<12} {:<6} {:>7} {:>7} {:>7} {:>8} {:>8} {:>9}",
        "gateway", "type", "total", "ok", "failed", "ok%", "retries", "avg"
    )
    .ok();
    for row in rows {
        writeln!(
            &mut out,
            "  {:<12} {:<6} {:>7} {:>7} {:>7} {:>8} {:>8} {:>9}",
            row.key.gateway,
            row.key.call_type.to_string(),
            row.total,
            row.success,
            row.failure,
            format_percent(row.success, row.total),
            row.retries,
            format_duration_single(Duration::from_millis(row.avg_duration_ms)),
        )
        .ok();
    }

    out
}
