//! Time ranges: relative expressions and their explicit UTC resolution.
//!
//! Resolution is a pure function of the range and a supplied `now`.
//! Weeks start on Monday (ISO); months, quarters and years are calendar
//! periods. Periods that are still running ("this month") end at `now`;
//! closed periods ("last month") end one second before the next period
//! starts, so `BETWEEN start AND end` never overlaps the following period.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("time range falls outside the supported calendar")]
    OutOfRange,
}

/// Granularity of a date dimension or range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

/// Calendar length of a resolved period, used to shift it for comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodSpan {
    Days(u32),
    Months(u32),
}

/// A relative time expression, resolved against "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativePeriod {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    LastDays(u32),
    ThisQuarter,
    LastQuarter,
    ThisYear,
    LastYear,
}

/// A concrete `[start, end]` interval in UTC, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub granularity: Granularity,
    /// Calendar span this range was resolved from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<PeriodSpan>,
}

/// A time range as extracted from a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Relative(RelativePeriod),
    Explicit(ExplicitRange),
}

static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:in|for|during|over)\s+)?(?:the\s+)?(today|yesterday|this week|last week|previous week|this month|last month|previous month|this quarter|last quarter|previous quarter|this year|year to date|ytd|last year|previous year|(?:last|past|previous)\s+(\d{1,4})\s+(days?|weeks?))$",
    )
    .unwrap()
});

static EXPLICIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:from|between)\s+(\d{4}-\d{2}-\d{2})\s+(?:to|and|until|through)\s+(\d{4}-\d{2}-\d{2})$",
    )
    .unwrap()
});

impl RelativePeriod {
    /// Parse a relative phrase ("last 7 days", "this quarter").
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = normalize(text);
        let caps = RELATIVE_RE.captures(&normalized)?;

        if let (Some(n), Some(unit)) = (caps.get(2), caps.get(3)) {
            let n: u32 = n.as_str().parse().ok()?;
            if n == 0 {
                return None;
            }
            let days = if unit.as_str().starts_with("week") {
                n.checked_mul(7)?
            } else {
                n
            };
            return Some(RelativePeriod::LastDays(days));
        }

        let period = match caps.get(1)?.as_str() {
            "today" => RelativePeriod::Today,
            "yesterday" => RelativePeriod::Yesterday,
            "this week" => RelativePeriod::ThisWeek,
            "last week" | "previous week" => RelativePeriod::LastWeek,
            "this month" => RelativePeriod::ThisMonth,
            "last month" | "previous month" => RelativePeriod::LastMonth,
            "this quarter" => RelativePeriod::ThisQuarter,
            "last quarter" | "previous quarter" => RelativePeriod::LastQuarter,
            "this year" | "year to date" | "ytd" => RelativePeriod::ThisYear,
            "last year" | "previous year" => RelativePeriod::LastYear,
            _ => return None,
        };
        Some(period)
    }

    /// Resolve against `now`.
    pub fn resolve_at(&self, now: DateTime<Utc>) -> Result<ExplicitRange, TimeError> {
        let today = now.date_naive();
        let midnight = start_of_day(today)?;

        let (start, end, span) = match self {
            RelativePeriod::Today => (midnight, now, PeriodSpan::Days(1)),
            RelativePeriod::Yesterday => (
                midnight - Duration::days(1),
                midnight - Duration::seconds(1),
                PeriodSpan::Days(1),
            ),
            RelativePeriod::ThisWeek => (week_start(now)?, now, PeriodSpan::Days(7)),
            RelativePeriod::LastWeek => {
                let this_week = week_start(now)?;
                (
                    this_week - Duration::days(7),
                    this_week - Duration::seconds(1),
                    PeriodSpan::Days(7),
                )
            }
            RelativePeriod::ThisMonth => (month_start(today)?, now, PeriodSpan::Months(1)),
            RelativePeriod::LastMonth => {
                let this_month = month_start(today)?;
                (
                    sub_months(this_month, 1)?,
                    this_month - Duration::seconds(1),
                    PeriodSpan::Months(1),
                )
            }
            RelativePeriod::LastDays(n) => (
                now - Duration::days(i64::from(*n)),
                now,
                PeriodSpan::Days(*n),
            ),
            RelativePeriod::ThisQuarter => (quarter_start(today)?, now, PeriodSpan::Months(3)),
            RelativePeriod::LastQuarter => {
                let this_quarter = quarter_start(today)?;
                (
                    sub_months(this_quarter, 3)?,
                    this_quarter - Duration::seconds(1),
                    PeriodSpan::Months(3),
                )
            }
            RelativePeriod::ThisYear => (year_start(today.year())?, now, PeriodSpan::Months(12)),
            RelativePeriod::LastYear => {
                let this_year = year_start(today.year())?;
                (
                    year_start(today.year() - 1)?,
                    this_year - Duration::seconds(1),
                    PeriodSpan::Months(12),
                )
            }
        };

        let granularity = match span {
            PeriodSpan::Months(n) if n >= 3 => Granularity::Month,
            _ => Granularity::Day,
        };

        Ok(ExplicitRange {
            start,
            end,
            granularity,
            span: Some(span),
        })
    }
}

impl fmt::Display for RelativePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativePeriod::Today => write!(f, "today"),
            RelativePeriod::Yesterday => write!(f, "yesterday"),
            RelativePeriod::ThisWeek => write!(f, "this week"),
            RelativePeriod::LastWeek => write!(f, "last week"),
            RelativePeriod::ThisMonth => write!(f, "this month"),
            RelativePeriod::LastMonth => write!(f, "last month"),
            RelativePeriod::LastDays(n) => write!(f, "last {} days", n),
            RelativePeriod::ThisQuarter => write!(f, "this quarter"),
            RelativePeriod::LastQuarter => write!(f, "last quarter"),
            RelativePeriod::ThisYear => write!(f, "this year"),
            RelativePeriod::LastYear => write!(f, "last year"),
        }
    }
}

impl ExplicitRange {
    /// Whole days from `first` through `last`, inclusive.
    pub fn from_dates(first: NaiveDate, last: NaiveDate) -> Result<Self, TimeError> {
        let start = start_of_day(first)?;
        let next = last.succ_opt().ok_or(TimeError::OutOfRange)?;
        Ok(Self {
            start,
            end: start_of_day(next)? - Duration::seconds(1),
            granularity: Granularity::Day,
            span: None,
        })
    }

    /// The period immediately before this one, of the same length.
    pub fn previous_period(&self) -> Result<Self, TimeError> {
        match self.span {
            Some(PeriodSpan::Days(n)) => Ok(self.shift_by(Duration::days(i64::from(n)))),
            Some(PeriodSpan::Months(n)) => self.shift_months(n),
            None => {
                let length = self.end - self.start + Duration::seconds(1);
                Ok(self.shift_by(length))
            }
        }
    }

    /// The same range `months` calendar months earlier.
    ///
    /// A range that covers whole calendar months keeps covering whole
    /// months after the shift (last February ends on the 28th or 29th).
    pub fn shift_months(&self, months: u32) -> Result<Self, TimeError> {
        let start = sub_months(self.start, months)?;
        let end = match self.span {
            Some(PeriodSpan::Months(n)) if self.is_closed_month_period(n)? => {
                add_months(start, n)? - Duration::seconds(1)
            }
            _ => sub_months(self.end, months)?,
        };
        Ok(Self {
            start,
            end,
            granularity: self.granularity,
            span: self.span,
        })
    }

    fn shift_by(&self, delta: Duration) -> Self {
        Self {
            start: self.start - delta,
            end: self.end - delta,
            granularity: self.granularity,
            span: self.span,
        }
    }

    fn is_closed_month_period(&self, months: u32) -> Result<bool, TimeError> {
        Ok(self.end + Duration::seconds(1) == add_months(self.start, months)?)
    }
}

impl fmt::Display for ExplicitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

impl TimeRange {
    /// Parse a relative phrase or an explicit `from YYYY-MM-DD to YYYY-MM-DD`.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(period) = RelativePeriod::parse(text) {
            return Some(TimeRange::Relative(period));
        }

        let normalized = normalize(text);
        let caps = EXPLICIT_RE.captures(&normalized)?;
        let first = NaiveDate::parse_from_str(caps.get(1)?.as_str(), "%Y-%m-%d").ok()?;
        let last = NaiveDate::parse_from_str(caps.get(2)?.as_str(), "%Y-%m-%d").ok()?;
        if last < first {
            return None;
        }
        ExplicitRange::from_dates(first, last)
            .ok()
            .map(TimeRange::Explicit)
    }

    /// Resolve to an explicit range. Explicit ranges are returned unchanged.
    pub fn resolve_at(&self, now: DateTime<Utc>) -> Result<ExplicitRange, TimeError> {
        match self {
            TimeRange::Relative(period) => period.resolve_at(now),
            TimeRange::Explicit(range) => Ok(range.clone()),
        }
    }

    /// Resolve and wrap back into a `TimeRange`.
    pub fn resolved(&self, now: DateTime<Utc>) -> Result<TimeRange, TimeError> {
        self.resolve_at(now).map(TimeRange::Explicit)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::Relative(period) => write!(f, "{}", period),
            TimeRange::Explicit(range) => write!(f, "{}", range),
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>, TimeError> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or(TimeError::OutOfRange)
}

fn week_start(now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeError> {
    let today = now.date_naive();
    let offset = i64::from(today.weekday().num_days_from_monday());
    start_of_day(today - Duration::days(offset))
}

fn month_start(date: NaiveDate) -> Result<DateTime<Utc>, TimeError> {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).ok_or(TimeError::OutOfRange)?;
    start_of_day(first)
}

fn quarter_start(date: NaiveDate) -> Result<DateTime<Utc>, TimeError> {
    let month = (date.month0() / 3) * 3 + 1;
    let first = NaiveDate::from_ymd_opt(date.year(), month, 1).ok_or(TimeError::OutOfRange)?;
    start_of_day(first)
}

fn year_start(year: i32) -> Result<DateTime<Utc>, TimeError> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(TimeError::OutOfRange)?;
    start_of_day(first)
}

fn sub_months(dt: DateTime<Utc>, n: u32) -> Result<DateTime<Utc>, TimeError> {
    dt.checked_sub_months(Months::new(n))
        .ok_or(TimeError::OutOfRange)
}

fn add_months(dt: DateTime<Utc>, n: u32) -> Result<DateTime<Utc>, TimeError> {
    dt.checked_add_months(Months::new(n))
        .ok_or(TimeError::OutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_parse_relative_phrases() {
        assert_eq!(RelativePeriod::parse("Last Week"), Some(RelativePeriod::LastWeek));
        assert_eq!(
            RelativePeriod::parse("past 30 days"),
            Some(RelativePeriod::LastDays(30))
        );
        assert_eq!(
            RelativePeriod::parse("last 2 weeks"),
            Some(RelativePeriod::LastDays(14))
        );
        assert_eq!(RelativePeriod::parse("ytd"), Some(RelativePeriod::ThisYear));
        assert_eq!(
            RelativePeriod::parse("during the last quarter"),
            Some(RelativePeriod::LastQuarter)
        );
        assert_eq!(RelativePeriod::parse("last 0 days"), None);
        assert_eq!(RelativePeriod::parse("next week"), None);
    }

    #[test]
    fn test_parse_explicit_range() {
        let range = TimeRange::parse("from 2024-01-01 to 2024-01-31").unwrap();
        let TimeRange::Explicit(r) = range else {
            panic!("expected explicit range");
        };
        assert_eq!(r.start, at(2024, 1, 1, 0, 0, 0));
        assert_eq!(r.end, at(2024, 1, 31, 23, 59, 59));
        assert!(TimeRange::parse("from 2024-02-01 to 2024-01-01").is_none());
    }

    #[test]
    fn test_last_week_is_previous_iso_week() {
        // 2024-03-15 is a Friday
        let r = RelativePeriod::LastWeek
            .resolve_at(at(2024, 3, 15, 10, 30, 0))
            .unwrap();
        assert_eq!(r.start, at(2024, 3, 4, 0, 0, 0));
        assert_eq!(r.end, at(2024, 3, 10, 23, 59, 59));
    }

    #[test]
    fn test_this_week_on_monday_starts_today() {
        let now = at(2024, 3, 11, 8, 0, 0);
        let r = RelativePeriod::ThisWeek.resolve_at(now).unwrap();
        assert_eq!(r.start, at(2024, 3, 11, 0, 0, 0));
        assert_eq!(r.end, now);
    }

    #[test]
    fn test_last_month_handles_leap_february() {
        let r = RelativePeriod::LastMonth
            .resolve_at(at(2024, 3, 15, 0, 0, 0))
            .unwrap();
        assert_eq!(r.start, at(2024, 2, 1, 0, 0, 0));
        assert_eq!(r.end, at(2024, 2, 29, 23, 59, 59));
    }

    #[test]
    fn test_quarter_and_year() {
        let now = at(2024, 5, 20, 12, 0, 0);
        let this_q = RelativePeriod::ThisQuarter.resolve_at(now).unwrap();
        assert_eq!(this_q.start, at(2024, 4, 1, 0, 0, 0));
        assert_eq!(this_q.granularity, Granularity::Month);

        let last_q = RelativePeriod::LastQuarter.resolve_at(now).unwrap();
        assert_eq!(last_q.start, at(2024, 1, 1, 0, 0, 0));
        assert_eq!(last_q.end, at(2024, 3, 31, 23, 59, 59));

        let last_y = RelativePeriod::LastYear.resolve_at(now).unwrap();
        assert_eq!(last_y.start, at(2023, 1, 1, 0, 0, 0));
        assert_eq!(last_y.end, at(2023, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_previous_period_of_closed_month() {
        let feb = RelativePeriod::LastMonth
            .resolve_at(at(2024, 3, 15, 0, 0, 0))
            .unwrap();
        let jan = feb.previous_period().unwrap();
        assert_eq!(jan.start, at(2024, 1, 1, 0, 0, 0));
        assert_eq!(jan.end, at(2024, 1, 31, 23, 59, 59));
    }

    #[test]
    fn test_previous_period_of_explicit_range() {
        let TimeRange::Explicit(r) = TimeRange::parse("from 2024-01-01 to 2024-01-31").unwrap()
        else {
            panic!("expected explicit range");
        };
        let prev = r.previous_period().unwrap();
        assert_eq!(prev.start, at(2023, 12, 1, 0, 0, 0));
        assert_eq!(prev.end, at(2023, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_year_over_year_shift_of_to_date_range() {
        let now = at(2024, 3, 15, 9, 0, 0);
        let ytd = RelativePeriod::ThisYear.resolve_at(now).unwrap();
        let last = ytd.shift_months(12).unwrap();
        assert_eq!(last.start, at(2023, 1, 1, 0, 0, 0));
        assert_eq!(last.end, at(2023, 3, 15, 9, 0, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TimeRange::Relative(RelativePeriod::LastDays(7)).to_string(),
            "last 7 days"
        );
    }
}
