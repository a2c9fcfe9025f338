use chrono::{DateTime, Local, TimeDelta, Utc};

const BYTE_UNITS: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];
const DETAIL_TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Binary byte size with zero decimals, e.g. `512B`, `100Mi`, `2Gi`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes}B");
    }

    let mut divisor = 1024u64;
    let mut exponent = 0usize;
    let mut scaled = bytes / 1024;
    while scaled >= 1024 && exponent + 1 < BYTE_UNITS.len() {
        divisor *= 1024;
        exponent += 1;
        scaled /= 1024;
    }

    format!(
        "{:.0}{}i",
        bytes as f64 / divisor as f64,
        BYTE_UNITS[exponent]
    )
}

/// Coarse human duration: the largest unit that keeps the number readable.
pub fn format_duration(duration: TimeDelta) -> String {
    let seconds = duration.num_milliseconds().max(0) as f64 / 1_000.0;
    let minutes = seconds / 60.0;
    let hours = minutes / 60.0;

    if hours > 24.0 * 365.0 {
        format!("{:.0}y", hours / (24.0 * 365.0))
    } else if hours > 120.0 {
        format!("{:.0}d", hours / 24.0)
    } else if hours > 10.0 {
        format!("{hours:.0}h")
    } else if minutes > 10.0 {
        format!("{minutes:.0}m")
    } else {
        format!("{seconds:.0}s")
    }
}

pub fn format_age(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    since
        .map(|since| format_duration(now.signed_duration_since(since)))
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_cpu(millis: u64) -> String {
    format!("{millis}m")
}

pub fn format_percent(percent: Option<f64>) -> String {
    percent
        .map(|value| format!("{value:.2}%"))
        .unwrap_or_else(|| "-".to_string())
}

/// Renders a summed limit. Flags partial coverage with the number of
/// containers that actually declare one.
pub fn render_limit(
    value: u64,
    declared: usize,
    total: usize,
    format_value: fn(u64) -> String,
) -> String {
    if value == 0 {
        return "-".to_string();
    }
    if declared == total {
        format_value(value)
    } else {
        format!("{} ({declared})", format_value(value))
    }
}

pub fn render_cpu_limit(value: u64, declared: usize, total: usize) -> String {
    render_limit(value, declared, total, format_cpu)
}

pub fn render_memory_limit(value: u64, declared: usize, total: usize) -> String {
    render_limit(value, declared, total, format_bytes)
}

pub fn format_timestamp(time: Option<DateTime<Utc>>) -> String {
    time.map(|time| {
        time.with_timezone(&Local)
            .format(DETAIL_TIME_FORMAT)
            .to_string()
    })
    .unwrap_or_else(|| "-".to_string())
}

/// Cuts `text` to `max_chars` characters, marking the cut with an ellipsis.
pub fn compact_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out = text.chars().take(max_chars - 1).collect::<String>();
    out.push('…');
    out
}
