use std::time::Duration;

pub(crate) fn format_duration_single(d: Duration) -> String {
    // Always render as a single rounded component in one of: us, ms, s.
    let total_ns: u128 = d.as_nanos();

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    fn round_div(value: u128, unit: u128) -> u128 {
        // Round to nearest integer (ties round up).
        (value + (unit / 2)) / unit
    }

    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }
    if total_ns == 0 {
        return "0".to_string();
    }

    format!("{}us", round_div(total_ns, NS_PER_US))
}

pub(crate) fn format_percent(part: u64, total: u64) -> String {
    if total == 0 {
        return "-".to_string();
    }
    format!("{:.1}%", (part as f64) * 100.0 / (total as f64))
}
