use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, Month};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Report period type selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Custom,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Custom => "custom",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("unknown granularity: {0}")]
    UnknownGranularity(String),
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
}

impl FromStr for Granularity {
    type Err = WindowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "custom" => Ok(Granularity::Custom),
            other => Err(WindowError::UnknownGranularity(other.to_string())),
        }
    }
}

/// Inclusive calendar date range to query. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    start: Date,
    end: Date,
}

impl ReportWindow {
    /// Explicit custom range; bounds given in reverse order are swapped.
    pub fn custom(start: Date, end: Date) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    fn single(date: Date) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).whole_days() + 1
    }

    pub fn contains(&self, date: Date) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

/// Compute the date range for a report of `granularity` around `reference`.
pub fn resolve_window(reference: Date, granularity: Granularity) -> ReportWindow {
    match granularity {
        Granularity::Day | Granularity::Custom => ReportWindow::single(reference),
        Granularity::Week => week_window(reference),
        Granularity::Month => month_window(reference),
    }
}

/// Like [`resolve_window`], but honours an explicit range for custom reports
/// when both bounds are supplied.
pub fn resolve_selection(
    reference: Date,
    granularity: Granularity,
    custom_start: Option<Date>,
    custom_end: Option<Date>,
) -> ReportWindow {
    match (granularity, custom_start, custom_end) {
        (Granularity::Custom, Some(start), Some(end)) => ReportWindow::custom(start, end),
        _ => resolve_window(reference, granularity),
    }
}

fn week_window(reference: Date) -> ReportWindow {
    let back = i64::from(reference.weekday().number_days_from_sunday());
    let start = reference.checked_sub(Duration::days(back)).unwrap_or(reference);
    let end = start.checked_add(Duration::days(6)).unwrap_or(start);
    ReportWindow { start, end }
}

fn month_window(reference: Date) -> ReportWindow {
    let start = reference.replace_day(1).unwrap_or(reference);
    // Day zero of the following month.
    let next_month = match reference.month() {
        Month::December => Date::from_calendar_date(reference.year() + 1, Month::January, 1),
        month => Date::from_calendar_date(reference.year(), month.next(), 1),
    };
    let end = next_month
        .ok()
        .and_then(Date::previous_day)
        .unwrap_or(reference);
    ReportWindow { start, end }
}

pub fn parse_date(value: &str) -> Result<Date, WindowError> {
    Date::parse(value.trim(), DATE_FORMAT)
        .map_err(|_| WindowError::InvalidDate(value.to_string()))
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Weekday;
    use time::macros::date;

    #[test]
    fn day_window_is_single_date() {
        let window = resolve_window(date!(2024 - 03 - 13), Granularity::Day);

        assert_eq!(window.start(), date!(2024 - 03 - 13));
        assert_eq!(window.end(), date!(2024 - 03 - 13));
        assert_eq!(window.days(), 1);
    }

    #[test]
    fn custom_without_range_is_single_date() {
        let window = resolve_selection(date!(2024 - 03 - 13), Granularity::Custom, None, None);

        assert_eq!(window, resolve_window(date!(2024 - 03 - 13), Granularity::Day));
    }

    #[test]
    fn week_window_starts_on_preceding_sunday() {
        // 2024-03-13 is a Wednesday.
        let window = resolve_window(date!(2024 - 03 - 13), Granularity::Week);

        assert_eq!(window.start(), date!(2024 - 03 - 10));
        assert_eq!(window.start().weekday(), Weekday::Sunday);
        assert_eq!(window.end(), date!(2024 - 03 - 16));
        assert_eq!(window.end().weekday(), Weekday::Saturday);
        assert_eq!(window.days(), 7);
    }

    #[test]
    fn week_window_on_sunday_and_saturday_stays_in_same_week() {
        let sunday = resolve_window(date!(2024 - 03 - 10), Granularity::Week);
        let saturday = resolve_window(date!(2024 - 03 - 16), Granularity::Week);

        assert_eq!(sunday, saturday);
        assert_eq!(sunday.start(), date!(2024 - 03 - 10));
    }

    #[test]
    fn week_window_crosses_year_boundary() {
        // 2025-01-01 is a Wednesday.
        let window = resolve_window(date!(2025 - 01 - 01), Granularity::Week);

        assert_eq!(window.start(), date!(2024 - 12 - 29));
        assert_eq!(window.end(), date!(2025 - 01 - 04));
    }

    #[test]
    fn month_window_handles_leap_february() {
        let leap = resolve_window(date!(2024 - 02 - 15), Granularity::Month);
        let common = resolve_window(date!(2023 - 02 - 15), Granularity::Month);

        assert_eq!(leap.start(), date!(2024 - 02 - 01));
        assert_eq!(leap.end(), date!(2024 - 02 - 29));
        assert_eq!(common.start(), date!(2023 - 02 - 01));
        assert_eq!(common.end(), date!(2023 - 02 - 28));
    }

    #[test]
    fn month_window_handles_thirty_and_thirty_one_day_months() {
        let april = resolve_window(date!(2024 - 04 - 30), Granularity::Month);
        let december = resolve_window(date!(2024 - 12 - 01), Granularity::Month);

        assert_eq!(april.end(), date!(2024 - 04 - 30));
        assert_eq!(december.end(), date!(2024 - 12 - 31));
        assert_eq!(december.days(), 31);
    }

    #[test]
    fn custom_range_swaps_reversed_bounds() {
        let window = resolve_selection(
            date!(2024 - 01 - 01),
            Granularity::Custom,
            Some(date!(2024 - 01 - 20)),
            Some(date!(2024 - 01 - 05)),
        );

        assert_eq!(window.start(), date!(2024 - 01 - 05));
        assert_eq!(window.end(), date!(2024 - 01 - 20));
        assert!(window.contains(date!(2024 - 01 - 10)));
        assert!(!window.contains(date!(2024 - 01 - 21)));
    }

    #[test]
    fn explicit_range_ignored_for_non_custom_granularity() {
        let window = resolve_selection(
            date!(2024 - 03 - 13),
            Granularity::Day,
            Some(date!(2024 - 01 - 01)),
            Some(date!(2024 - 01 - 31)),
        );

        assert_eq!(window.days(), 1);
    }

    #[test]
    fn granularity_parses_case_insensitively() {
        assert_eq!("Week".parse::<Granularity>(), Ok(Granularity::Week));
        assert_eq!(
            "fortnight".parse::<Granularity>(),
            Err(WindowError::UnknownGranularity("fortnight".to_string()))
        );
    }

    #[test]
    fn dates_parse_and_format_as_iso() {
        let parsed = parse_date("2024-02-29").expect("valid date");

        assert_eq!(parsed, date!(2024 - 02 - 29));
        assert_eq!(format_date(parsed), "2024-02-29");
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("29/02/2024").is_err());
    }
}
