//! Interval-to-duration table (§4.6, authoritative). `1M` is treated as
//! 30 days for pagination windowing; unknown intervals default to 1h.

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;
const MONTH_MS: i64 = 30 * DAY_MS;

pub fn duration_ms(interval: &str) -> i64 {
    match interval {
        "1m" => MINUTE_MS,
        "3m" => 3 * MINUTE_MS,
        "5m" => 5 * MINUTE_MS,
        "15m" => 15 * MINUTE_MS,
        "30m" => 30 * MINUTE_MS,
        "1h" => HOUR_MS,
        "2h" => 2 * HOUR_MS,
        "4h" => 4 * HOUR_MS,
        "6h" => 6 * HOUR_MS,
        "8h" => 8 * HOUR_MS,
        "12h" => 12 * HOUR_MS,
        "1d" => DAY_MS,
        "3d" => 3 * DAY_MS,
        "1w" => WEEK_MS,
        "1M" => MONTH_MS,
        _ => HOUR_MS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_intervals_match_the_table() {
        assert_eq!(duration_ms("1m"), 60_000);
        assert_eq!(duration_ms("1h"), 3_600_000);
        assert_eq!(duration_ms("1d"), 86_400_000);
        assert_eq!(duration_ms("1w"), 7 * 86_400_000);
        assert_eq!(duration_ms("1M"), 30 * 86_400_000);
    }

    #[test]
    fn unknown_interval_defaults_to_one_hour() {
        assert_eq!(duration_ms("7m"), duration_ms("1h"));
    }
}
