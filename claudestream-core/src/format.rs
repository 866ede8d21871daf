//! Formatting helpers shared by the transcript, the summary, and the CLI.

use chrono::{DateTime, Utc};

/// Format a USD cost: two decimals from $1 up, four below.
pub fn format_cost(cost_usd: f64) -> String {
    if cost_usd >= 1.0 {
        format!("${:.2}", cost_usd)
    } else {
        format!("${:.4}", cost_usd)
    }
}

/// Format a millisecond duration as `Ns` under a minute, else `Mm Ss`.
pub fn format_duration_ms(duration_ms: u64) -> String {
    let total_secs = duration_ms / 1000;
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    }
}

/// Format a token count (e.g., "999", "1.5K", "2.3M").
///
/// The "K" range runs right up to one million, so 999,999 renders as
/// "1000.0K" rather than jumping to "M" early.
pub fn format_tokens(tokens: u64) -> String {
    if tokens < 1_000 {
        tokens.to_string()
    } else if tokens < 1_000_000 {
        format!("{:.1}K", tokens as f64 / 1_000.0)
    } else {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    }
}

/// Wall-clock time of day for transcript rows.
pub fn format_clock(ts: DateTime<Utc>) -> String {
    ts.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_cost_precision() {
        assert_eq!(format_cost(0.0), "$0.0000");
        assert_eq!(format_cost(0.01234), "$0.0123");
        assert_eq!(format_cost(0.99999), "$1.0000");
        assert_eq!(format_cost(1.0), "$1.00");
        assert_eq!(format_cost(12.5), "$12.50");
    }

    #[test]
    fn test_format_duration_boundaries() {
        assert_eq!(format_duration_ms(0), "0s");
        assert_eq!(format_duration_ms(59_999), "59s");
        assert_eq!(format_duration_ms(60_000), "1m 0s");
        assert_eq!(format_duration_ms(125_500), "2m 5s");
    }

    #[test]
    fn test_format_tokens_boundaries() {
        assert_eq!(format_tokens(0), "0");
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_000), "1.0K");
        assert_eq!(format_tokens(1_560), "1.6K");
        assert_eq!(format_tokens(999_999), "1000.0K");
        assert_eq!(format_tokens(1_000_000), "1.0M");
        assert_eq!(format_tokens(2_340_000), "2.3M");
    }

    #[test]
    fn test_format_clock() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 25, 9, 5, 3).unwrap();
        assert_eq!(format_clock(ts), "09:05:03");
    }
}
