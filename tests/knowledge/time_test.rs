use chrono::{DateTime, TimeZone, Utc};
use nlq::knowledge::{Catalog, FixedClock, KnowledgeBase};
use nlq::model::{ExplicitRange, RelativePeriod, TimeRange};
use std::sync::Arc;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

fn kb_at(now: DateTime<Utc>) -> KnowledgeBase {
    KnowledgeBase::new(Catalog::gaming().unwrap()).with_clock(Arc::new(FixedClock(now)))
}

#[test]
fn test_last_7_days_at_fixed_now() {
    let kb = kb_at(at(2024, 3, 15, 0, 0, 0));
    let range = TimeRange::parse("last 7 days").unwrap();
    let resolved = kb.resolve_time_range(&range).unwrap();

    assert_eq!(resolved.start, at(2024, 3, 8, 0, 0, 0));
    assert_eq!(resolved.end, at(2024, 3, 15, 0, 0, 0));
}

#[test]
fn test_resolution_is_deterministic_for_a_given_now() {
    let kb = kb_at(at(2024, 3, 15, 9, 30, 0));
    for phrase in ["today", "last week", "this month", "last quarter", "past 30 days"] {
        let range = TimeRange::parse(phrase).unwrap();
        assert_eq!(
            kb.resolve_time_range(&range).unwrap(),
            kb.resolve_time_range(&range).unwrap(),
            "{phrase}"
        );
    }
}

#[test]
fn test_explicit_range_resolves_to_itself() {
    let now = at(2024, 3, 15, 0, 0, 0);
    for phrase in ["last month", "yesterday", "from 2024-01-01 to 2024-01-31"] {
        let once = TimeRange::parse(phrase).unwrap().resolved(now).unwrap();
        let twice = once.resolved(now).unwrap();
        assert_eq!(once, twice, "{phrase}");

        // a later clock does not move an explicit range
        let later = once.resolved(at(2025, 1, 1, 0, 0, 0)).unwrap();
        assert_eq!(once, later, "{phrase}");
    }
}

#[test]
fn test_weeks_start_on_monday() {
    // Sunday 2024-03-17: the ISO week started on Monday the 11th
    let kb = kb_at(at(2024, 3, 17, 12, 0, 0));

    let this_week = kb
        .resolve_time_range(&TimeRange::Relative(RelativePeriod::ThisWeek))
        .unwrap();
    assert_eq!(this_week.start, at(2024, 3, 11, 0, 0, 0));

    let last_week = kb
        .resolve_time_range(&TimeRange::Relative(RelativePeriod::LastWeek))
        .unwrap();
    assert_eq!(last_week.start, at(2024, 3, 4, 0, 0, 0));
    assert_eq!(last_week.end, at(2024, 3, 10, 23, 59, 59));
}

#[test]
fn test_calendar_months() {
    let kb = kb_at(at(2024, 3, 15, 0, 0, 0));
    let last_month = kb
        .resolve_time_range(&TimeRange::Relative(RelativePeriod::LastMonth))
        .unwrap();
    assert_eq!(last_month.start, at(2024, 2, 1, 0, 0, 0));
    assert_eq!(last_month.end, at(2024, 2, 29, 23, 59, 59));

    let year_ago = last_month.shift_months(12).unwrap();
    assert_eq!(year_ago.start, at(2023, 2, 1, 0, 0, 0));
    assert_eq!(year_ago.end, at(2023, 2, 28, 23, 59, 59));
}

#[test]
fn test_explicit_range_from_dates() {
    let range = TimeRange::parse("between 2024-01-01 and 2024-01-07").unwrap();
    let TimeRange::Explicit(ExplicitRange { start, end, .. }) = range else {
        panic!("expected explicit range");
    };
    assert_eq!(start, at(2024, 1, 1, 0, 0, 0));
    assert_eq!(end, at(2024, 1, 7, 23, 59, 59));

    assert!(TimeRange::parse("from 2024-02-01 to 2024-01-01").is_none());
}
