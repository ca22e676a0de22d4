//! Date reconstruction for listing columns

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Field order of a composite date column whose first part is not a
/// four-digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateOrder {
    #[default]
    YearMonthDay,
    MonthDayYear,
    DayMonthYear,
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Resolve a year column to four digits.
///
/// Two-digit years land in the century closest to `reference_year`; on an
/// exact tie the earlier candidate wins.
pub fn resolve_year(text: &str, reference_year: i32) -> Option<i32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = i32::from_str_radix(text, 10).ok()?;
    if text.len() > 2 {
        return Some(value);
    }

    let base = reference_year.div_euclid(100) * 100;
    [base - 100 + value, base + value, base + 100 + value]
        .into_iter()
        .min_by_key(|candidate| ((candidate - reference_year).abs(), *candidate))
}

/// Numeric month (`1`..`12`) or an English month name/abbreviation.
pub fn parse_month(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Ok(n) = text.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    let lower = text.to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|i| i as u32 + 1)
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

/// Build a date from separate year/month/day columns.
pub fn from_components(
    year: &str,
    month: &str,
    day: &str,
    reference_year: i32,
) -> Option<NaiveDate> {
    let year = resolve_year(year, reference_year)?;
    let month = parse_month(month)?;
    let day = day.trim().parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a composite date such as `2024-01-15`, `01-15-24` or `15.01.24`.
pub fn parse_date(text: &str, order: DateOrder, reference_year: i32) -> Option<NaiveDate> {
    let parts: Vec<&str> = text.trim().split(['-', '.', '/']).collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };

    let order = if a.len() == 4 { DateOrder::YearMonthDay } else { order };
    let (year, month, day) = match order {
        DateOrder::YearMonthDay => (a, b, c),
        DateOrder::MonthDayYear => (c, a, b),
        DateOrder::DayMonthYear => (c, b, a),
    };
    from_components(year, month, day, reference_year)
}

/// Parse `<date> [<time>]`; a missing time means midnight.
pub fn parse_timestamp(
    text: &str,
    order: DateOrder,
    reference_year: i32,
) -> Option<NaiveDateTime> {
    let mut parts = text.split_whitespace();
    let date = parse_date(parts.next()?, order, reference_year)?;
    let time = match parts.next() {
        Some(t) => parse_time(t)?,
        None => NaiveTime::MIN,
    };
    Some(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_digit_year_nearest_century() {
        assert_eq!(resolve_year("05", 2024), Some(2005));
        assert_eq!(resolve_year("99", 2024), Some(1999));
        assert_eq!(resolve_year("30", 2024), Some(2030));
        assert_eq!(resolve_year("01", 2098), Some(2101));
        assert_eq!(resolve_year("74", 2024), Some(1974));
    }

    #[test]
    fn test_four_digit_year_untouched() {
        assert_eq!(resolve_year("1987", 2024), Some(1987));
        assert_eq!(resolve_year("2105", 2024), Some(2105));
        assert_eq!(resolve_year("2x", 2024), None);
    }

    #[test]
    fn test_month_names() {
        assert_eq!(parse_month("03"), Some(3));
        assert_eq!(parse_month("Dec"), Some(12));
        assert_eq!(parse_month("january"), Some(1));
        assert_eq!(parse_month("13"), None);
        assert_eq!(parse_month("xy"), None);
    }

    #[test]
    fn test_composite_dates() {
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        assert_eq!(parse_date("2024-01-15", DateOrder::DayMonthYear, 2024), d(2024, 1, 15));
        assert_eq!(parse_date("01-15-24", DateOrder::MonthDayYear, 2024), d(2024, 1, 15));
        assert_eq!(parse_date("15.01.05", DateOrder::DayMonthYear, 2024), d(2005, 1, 15));
        assert_eq!(parse_date("31-02-2024", DateOrder::DayMonthYear, 2024), None);
        assert_eq!(parse_date("2024-01", DateOrder::YearMonthDay, 2024), None);
    }

    #[test]
    fn test_timestamp() {
        let ts = parse_timestamp("2024-01-15 10:30", DateOrder::YearMonthDay, 2024).unwrap();
        assert_eq!(ts.to_string(), "2024-01-15 10:30:00");
        let midnight = parse_timestamp("2024-01-15", DateOrder::YearMonthDay, 2024).unwrap();
        assert_eq!(midnight.time(), NaiveTime::MIN);
        assert!(parse_timestamp("2024-01-15 25:99", DateOrder::YearMonthDay, 2024).is_none());
    }
}
