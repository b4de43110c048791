//! Relative timeframes and the absolute windows they resolve to

use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Dashboard timeframe shorthand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    /// `1d`: today only
    Today,
    /// `7d`
    #[default]
    Week,
    /// `30d`
    Month,
    /// `90d`
    Quarter,
}

impl Timeframe {
    /// Parse a `timeframe` tag. Absent or unrecognized tags fall back to `7d`.
    pub fn parse(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            Some("1d") => Self::Today,
            Some("7d") => Self::Week,
            Some("30d") => Self::Month,
            Some("90d") => Self::Quarter,
            _ => Self::default(),
        }
    }

    /// Whole days before today covered by the window
    pub fn days_back(self) -> u64 {
        match self {
            Self::Today => 0,
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }
}

/// Half-open window `[start, end)` over local naive timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// From `days_back` days before `today` at 00:00 through the end of `today`
    pub fn for_timeframe(timeframe: Timeframe, today: NaiveDate) -> Self {
        let first = today
            .checked_sub_days(Days::new(timeframe.days_back()))
            .unwrap_or(NaiveDate::MIN);
        Self::between(first, today)
    }

    /// Both calendar days inclusive
    pub fn between(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            start: start_of(first),
            end: start_of(next_day(last)),
        }
    }

    /// A single calendar day
    pub fn day(date: NaiveDate) -> Self {
        Self::between(date, date)
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Server-local calendar date
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_parse_known_tags() {
        assert_eq!(Timeframe::parse(Some("1d")), Timeframe::Today);
        assert_eq!(Timeframe::parse(Some("7d")), Timeframe::Week);
        assert_eq!(Timeframe::parse(Some("30d")), Timeframe::Month);
        assert_eq!(Timeframe::parse(Some("90d")), Timeframe::Quarter);
    }

    #[test]
    fn test_parse_falls_back_to_week() {
        assert_eq!(Timeframe::parse(None), Timeframe::Week);
        assert_eq!(Timeframe::parse(Some("365d")), Timeframe::Week);
        assert_eq!(Timeframe::parse(Some("")), Timeframe::Week);
    }

    #[test]
    fn test_today_window() {
        let range = DateRange::for_timeframe(Timeframe::Today, date(2026, 10, 15));
        assert_eq!(range.start, at(2026, 10, 15, 0, 0, 0));
        assert_eq!(range.end, at(2026, 10, 16, 0, 0, 0));
        assert!(range.contains(at(2026, 10, 15, 23, 59, 59)));
        assert!(!range.contains(at(2026, 10, 16, 0, 0, 0)));
        assert!(!range.contains(at(2026, 10, 14, 23, 59, 59)));
    }

    #[test]
    fn test_windows_cross_month_boundaries() {
        let today = date(2026, 3, 2);
        let week = DateRange::for_timeframe(Timeframe::Week, today);
        assert_eq!(week.start, at(2026, 2, 23, 0, 0, 0));

        let month = DateRange::for_timeframe(Timeframe::Month, today);
        assert_eq!(month.start, at(2026, 1, 31, 0, 0, 0));

        let quarter = DateRange::for_timeframe(Timeframe::Quarter, today);
        assert_eq!(quarter.start, at(2025, 12, 2, 0, 0, 0));
        assert_eq!(quarter.end, at(2026, 3, 3, 0, 0, 0));
    }

    #[test]
    fn test_between_is_inclusive_of_last_day() {
        let range = DateRange::between(date(2026, 12, 30), date(2026, 12, 31));
        assert_eq!(range.end, at(2027, 1, 1, 0, 0, 0));
        assert!(range.contains(at(2026, 12, 31, 12, 0, 0)));
    }
}
