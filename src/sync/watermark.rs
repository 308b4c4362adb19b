use chrono::{Days, NaiveDate};

use crate::types::FetchWindow;

/// Work out which days still need fetching.
///
/// With nothing stored the window opens today. Otherwise it opens the day
/// after the latest stored kick-off. `None` once the store has reached
/// `horizon`.
pub fn fetch_window(
    max_stored: Option<NaiveDate>,
    horizon: NaiveDate,
    today: NaiveDate,
) -> Option<FetchWindow> {
    let start = match max_stored {
        Some(max) if max >= horizon => return None,
        Some(max) => max.checked_add_days(Days::new(1))?,
        None => today,
    };
    (start <= horizon).then_some(FetchWindow { start, end: horizon })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn window_opens_the_day_after_the_watermark() {
        let window = fetch_window(Some(day("2025-06-10")), day("2025-08-31"), day("2025-06-01")).unwrap();
        assert_eq!(window.start, day("2025-06-11"));
        assert_eq!(window.end, day("2025-08-31"));
        assert_eq!(window.to_string(), "[2025-06-11, 2025-08-31]");
        assert_eq!(window.path(), "fixtures/between/2025-06-11/2025-08-31");
    }

    #[test]
    fn caught_up_store_needs_no_fetch() {
        assert_eq!(fetch_window(Some(day("2025-08-31")), day("2025-08-31"), day("2025-06-01")), None);
        assert_eq!(fetch_window(Some(day("2025-09-02")), day("2025-08-31"), day("2025-06-01")), None);
    }

    #[test]
    fn empty_store_starts_today() {
        let window = fetch_window(None, day("2025-08-31"), day("2025-06-01")).unwrap();
        assert_eq!(window.start, day("2025-06-01"));
    }

    #[test]
    fn empty_store_past_horizon_needs_no_fetch() {
        assert_eq!(fetch_window(None, day("2025-08-31"), day("2025-09-01")), None);
    }

    #[test]
    fn one_day_behind_fetches_a_single_day() {
        let window = fetch_window(Some(day("2025-08-30")), day("2025-08-31"), day("2025-06-01")).unwrap();
        assert_eq!(window.start, window.end);
    }
}
