/// Observation snapshot freshness.
///
/// BOM republishes station observations every 30 minutes. A snapshot is
/// considered outdated once the wall clock passes the timestamp of its newest
/// record by more than the staleness window, independent of any rate limit
/// the caller applies to `update()`.
///
/// # Clock injection
/// Functions take `now` rather than reading the clock, so tests are
/// deterministic without mocking. The recorded timestamp is station-local
/// time, so `now` is local naive time as well.

use chrono::{Local, NaiveDateTime};

/// Minutes after the newest record before a re-fetch is due.
pub const STALENESS_WINDOW_MINUTES: i64 = 35;

/// Returns `true` if a fetch is due at `now`.
///
/// Never-fetched (`last_updated == None`) is always due. Otherwise due is
/// strictly greater than the window:
///   now >  last + window  →  due
///   now == last + window  →  not due
pub fn fetch_due_at(
    last_updated: Option<NaiveDateTime>,
    window_minutes: i64,
    now: NaiveDateTime,
) -> bool {
    match last_updated {
        None => true,
        Some(last) => now > last + chrono::Duration::minutes(window_minutes),
    }
}

/// Current wall-clock time in the host's local zone.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_never_fetched_is_always_due() {
        assert!(fetch_due_at(None, STALENESS_WINDOW_MINUTES, at(0, 0)));
    }

    #[test]
    fn test_just_fetched_is_not_due() {
        assert!(!fetch_due_at(Some(at(14, 30)), STALENESS_WINDOW_MINUTES, at(14, 30)));
    }

    #[test]
    fn test_thirty_minutes_old_is_not_due() {
        // BOM publishes every 30 minutes; the window leaves 5 minutes of slack.
        assert!(!fetch_due_at(Some(at(14, 30)), STALENESS_WINDOW_MINUTES, at(15, 0)));
    }

    #[test]
    fn test_exactly_at_window_is_not_due() {
        assert!(!fetch_due_at(Some(at(14, 30)), STALENESS_WINDOW_MINUTES, at(15, 5)));
    }

    #[test]
    fn test_one_minute_past_window_is_due() {
        assert!(fetch_due_at(Some(at(14, 30)), STALENESS_WINDOW_MINUTES, at(15, 6)));
    }

    #[test]
    fn test_same_snapshot_due_under_tight_window_not_under_loose() {
        let last = Some(at(14, 0));
        assert!(fetch_due_at(last, 20, at(14, 30)));
        assert!(!fetch_due_at(last, 60, at(14, 30)));
    }
}
