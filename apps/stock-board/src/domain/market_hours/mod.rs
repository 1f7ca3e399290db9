//! KRX Trading Session Gate
//!
//! The realtime stream is only worth opening while the exchange trades:
//! Monday to Friday, 09:00 through 15:30 Korea Standard Time. KST is UTC+9
//! with no daylight saving. Holidays are not modelled.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Offset, Timelike, Utc, Weekday};

/// KST offset from UTC, in seconds.
const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Session open, minutes after midnight KST.
const OPEN_MINUTE: u32 = 9 * 60;

/// Session close, minutes after midnight KST. The close minute itself is open.
const CLOSE_MINUTE: u32 = 15 * 60 + 30;

/// Korea Standard Time.
#[must_use]
pub fn kst() -> FixedOffset {
    // 9h is always a valid offset; fall back to UTC rather than panic.
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Whether the regular session is open at `now`.
///
/// Resolution is one minute: 15:30:59 is open, 15:31:00 is closed.
#[must_use]
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&kst());
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minute = local.hour() * 60 + local.minute();
    (OPEN_MINUTE..=CLOSE_MINUTE).contains(&minute)
}

/// Session open time, KST.
#[must_use]
pub fn session_open() -> NaiveTime {
    NaiveTime::from_hms_opt(OPEN_MINUTE / 60, OPEN_MINUTE % 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Last open minute, KST.
#[must_use]
pub fn session_close() -> NaiveTime {
    NaiveTime::from_hms_opt(CLOSE_MINUTE / 60, CLOSE_MINUTE % 60, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn kst_instant(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        kst()
            .with_ymd_and_hms(y, m, d, h, min, s)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    // 2026-10-16 is a Friday, 2026-10-17 a Saturday.
    #[test_case(2026, 10, 16, 8, 59, 59 => false ; "before open")]
    #[test_case(2026, 10, 16, 9, 0, 0 => true ; "at open")]
    #[test_case(2026, 10, 16, 12, 0, 0 => true ; "midday")]
    #[test_case(2026, 10, 16, 15, 30, 0 => true ; "close minute")]
    #[test_case(2026, 10, 16, 15, 30, 59 => true ; "end of close minute")]
    #[test_case(2026, 10, 16, 15, 31, 0 => false ; "after close")]
    #[test_case(2026, 10, 17, 10, 0, 0 => false ; "saturday")]
    #[test_case(2026, 10, 18, 10, 0, 0 => false ; "sunday")]
    fn gate(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> bool {
        is_market_open(kst_instant(y, m, d, h, min, s))
    }

    #[test]
    fn uses_kst_not_utc_weekday() {
        // Sunday 23:30 UTC is Monday 08:30 KST: closed.
        let sunday_night = Utc.with_ymd_and_hms(2026, 10, 18, 23, 30, 0).single().unwrap();
        assert!(!is_market_open(sunday_night));

        // Monday 00:30 UTC is Monday 09:30 KST: open.
        let monday = Utc.with_ymd_and_hms(2026, 10, 19, 0, 30, 0).single().unwrap();
        assert!(is_market_open(monday));

        // Friday 07:00 UTC is Friday 16:00 KST: closed.
        let friday_evening = Utc.with_ymd_and_hms(2026, 10, 16, 7, 0, 0).single().unwrap();
        assert!(!is_market_open(friday_evening));
    }

    #[test]
    fn session_bounds() {
        assert_eq!(session_open(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(session_close(), NaiveTime::from_hms_opt(15, 30, 0).unwrap());
    }
}
