use std::time::Duration;

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Start of a trailing time window ending now, in Unix ms.
/// Saturates instead of overflowing for absurdly large windows.
pub fn window_start_ms(window: Duration) -> i64 {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    now_ms().saturating_sub(window_ms)
}

/// Convert Unix ms to a `YYYY-MM-DD` UTC date string.
/// Howard Hinnant's civil_from_days.
pub fn date_from_ms(ms: i64) -> String {
    let secs = ms.div_euclid(1000);
    let days = secs.div_euclid(86400) + 719468;
    let era = days.div_euclid(146097);
    let doe = days.rem_euclid(146097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{y:04}-{m:02}-{d:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_from_known_timestamps() {
        assert_eq!(date_from_ms(0), "1970-01-01");
        assert_eq!(date_from_ms(86_399_999), "1970-01-01");
        assert_eq!(date_from_ms(86_400_000), "1970-01-02");
        // 2024-02-29T12:00:00Z
        assert_eq!(date_from_ms(1_709_208_000_000), "2024-02-29");
        assert_eq!(date_from_ms(-1), "1969-12-31");
    }

    #[test]
    fn window_start_is_behind_now() {
        let before = now_ms();
        let start = window_start_ms(Duration::from_secs(60));
        assert!(start <= before - 60_000 + 5);
        assert!(start >= before - 60_000 - 5_000);
    }

    #[test]
    fn huge_window_saturates() {
        assert!(window_start_ms(Duration::MAX) < 0);
    }
}
