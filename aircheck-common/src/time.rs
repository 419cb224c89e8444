//! Broadcast timestamp utilities
//!
//! Stations publish local wall-clock times; the catalog stores both the
//! listed local instant and its UTC equivalent derived from the station's
//! configured offset.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Format a broadcast date as `YYYY-MM-DD`
pub fn broadcast_date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a listed wall-clock time, trying the formats observed across
/// station playlist documents
pub fn parse_clock_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    for fmt in ["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p", "%I:%M%p"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Some(t);
        }
    }
    None
}

/// Convert a station-local instant to UTC using the station's configured
/// offset (minutes east of UTC; negative west)
pub fn utc_from_local(local: NaiveDateTime, utc_offset_minutes: i32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(local - Duration::minutes(utc_offset_minutes as i64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_broadcast_date_str_is_iso() {
        let date = NaiveDate::from_ymd_opt(2019, 3, 15).unwrap();
        assert_eq!(broadcast_date_str(date), "2019-03-15");
    }

    #[test]
    fn test_parse_clock_time_24h() {
        let t = parse_clock_time("14:30").unwrap();
        assert_eq!((t.hour(), t.minute()), (14, 30));
        let t = parse_clock_time("06:05:30").unwrap();
        assert_eq!((t.hour(), t.minute(), t.second()), (6, 5, 30));
    }

    #[test]
    fn test_parse_clock_time_12h() {
        let t = parse_clock_time("2:30 PM").unwrap();
        assert_eq!((t.hour(), t.minute()), (14, 30));
        let t = parse_clock_time("12:01AM").unwrap();
        assert_eq!((t.hour(), t.minute()), (0, 1));
    }

    #[test]
    fn test_parse_clock_time_garbage() {
        assert!(parse_clock_time("noonish").is_none());
        assert!(parse_clock_time("").is_none());
    }

    #[test]
    fn test_utc_from_local_west_of_utc() {
        // 09:00 local at UTC-5 is 14:00 UTC
        let local = NaiveDate::from_ymd_opt(2019, 3, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let utc = utc_from_local(local, -300);
        assert_eq!(utc.format("%Y-%m-%d %H:%M").to_string(), "2019-03-15 14:00");
    }

    #[test]
    fn test_utc_from_local_crosses_midnight() {
        // 22:00 local at UTC-6 is 04:00 UTC the next day
        let local = NaiveDate::from_ymd_opt(2019, 3, 15)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap();
        let utc = utc_from_local(local, -360);
        assert_eq!(utc.format("%Y-%m-%d %H:%M").to_string(), "2019-03-16 04:00");
    }

    #[test]
    fn test_utc_from_local_zero_offset_is_identity() {
        let local = NaiveDate::from_ymd_opt(2019, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let utc = utc_from_local(local, 0);
        assert_eq!(utc.naive_utc(), local);
    }
}
