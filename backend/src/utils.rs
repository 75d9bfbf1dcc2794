use chrono::{DateTime, Utc};

/// Wall-clock time in Unix seconds, the unit of `timestamp_server`.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Renders Unix seconds as a UTC datetime for log lines and reports.
pub fn format_timestamp(secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{secs}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20 UTC");
        assert_eq!(format_timestamp(i64::MAX), format!("{}s", i64::MAX));
    }
}
