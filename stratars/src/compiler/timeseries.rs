//! Period enumeration for time dimensions.
//!
//! Truncation SQL lives on the dialect (`Dialect::time_grouped_column`);
//! this module owns the pure, calendar-aware side: enumerating the bucket
//! starts a date range spans, used downstream to fill buckets with no
//! matching rows.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::dialect::Dialect;
use crate::error::{Result, StrataError};
use crate::query::Granularity;

/// Dialect truncation expression for a granularity bucket.
pub fn truncation_expression(
    dialect: &dyn Dialect,
    granularity: Granularity,
    date_expr: &str,
) -> Result<String> {
    dialect.time_grouped_column(granularity, date_expr)
}

/// Bucket-start timestamps spanning the inclusive `[start, end]` range.
///
/// The first boundary is the start of the bucket containing `start`; weeks
/// align to the ISO week start (Monday), months to the first calendar day,
/// quarters to Jan/Apr/Jul/Oct 1, years to January 1. An inverted range
/// yields an empty sequence.
pub fn period_boundaries(
    granularity: Granularity,
    start_inclusive: &str,
    end_inclusive: &str,
) -> Result<Vec<NaiveDateTime>> {
    let start = parse_bound(start_inclusive)?;
    let end = parse_bound(end_inclusive)?;
    if end < start {
        return Ok(Vec::new());
    }

    let mut cursor = bucket_start(granularity, start);
    let mut boundaries = Vec::new();
    while cursor <= end {
        boundaries.push(cursor);
        cursor = next_bucket(granularity, cursor)?;
    }
    Ok(boundaries)
}

/// Parse a range bound as a date or a date-time.
fn parse_bound(bound: &str) -> Result<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(bound, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(bound, format) {
            return Ok(ts);
        }
    }
    Err(StrataError::Assembly(format!(
        "unparseable date bound: {bound}"
    )))
}

fn bucket_start(granularity: Granularity, ts: NaiveDateTime) -> NaiveDateTime {
    let date = ts.date();
    match granularity {
        Granularity::Second => ts.with_nanosecond(0).unwrap_or(ts),
        Granularity::Minute => date.and_hms_opt(ts.hour(), ts.minute(), 0).unwrap_or(ts),
        Granularity::Hour => date.and_hms_opt(ts.hour(), 0, 0).unwrap_or(ts),
        Granularity::Day => date.and_time(NaiveTime::MIN),
        Granularity::Week => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            monday.and_time(NaiveTime::MIN)
        }
        Granularity::Month => first_of_month(date.year(), date.month()),
        Granularity::Quarter => {
            let quarter_month = ((date.month0() / 3) * 3) + 1;
            first_of_month(date.year(), quarter_month)
        }
        Granularity::Year => first_of_month(date.year(), 1),
    }
}

fn next_bucket(granularity: Granularity, cursor: NaiveDateTime) -> Result<NaiveDateTime> {
    let stepped = match granularity {
        Granularity::Second => cursor.checked_add_signed(Duration::seconds(1)),
        Granularity::Minute => cursor.checked_add_signed(Duration::minutes(1)),
        Granularity::Hour => cursor.checked_add_signed(Duration::hours(1)),
        Granularity::Day => cursor.checked_add_signed(Duration::days(1)),
        Granularity::Week => cursor.checked_add_signed(Duration::weeks(1)),
        Granularity::Month => cursor.checked_add_months(Months::new(1)),
        Granularity::Quarter => cursor.checked_add_months(Months::new(3)),
        Granularity::Year => cursor.checked_add_months(Months::new(12)),
    };
    stepped.ok_or_else(|| StrataError::Assembly("date range out of bounds".to_string()))
}

fn first_of_month(year: i32, month: u32) -> NaiveDateTime {
    // month is always 1..=12 here
    NaiveDate::from_ymd_opt(year, month, 1)
        .expect("valid first-of-month date")
        .and_time(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_time(NaiveTime::MIN)
    }

    #[test]
    fn month_boundaries_span_inclusive_range() {
        let boundaries = period_boundaries(Granularity::Month, "2021-01-01", "2021-03-31").unwrap();
        assert_eq!(
            boundaries,
            vec![date(2021, 1, 1), date(2021, 2, 1), date(2021, 3, 1)]
        );
    }

    #[test]
    fn month_start_aligns_down() {
        let boundaries = period_boundaries(Granularity::Month, "2021-01-15", "2021-02-02").unwrap();
        assert_eq!(boundaries, vec![date(2021, 1, 1), date(2021, 2, 1)]);
    }

    #[test]
    fn week_boundaries_align_to_monday() {
        // 2021-01-01 is a Friday; its ISO week starts Monday 2020-12-28
        let boundaries = period_boundaries(Granularity::Week, "2021-01-01", "2021-01-12").unwrap();
        assert_eq!(
            boundaries,
            vec![date(2020, 12, 28), date(2021, 1, 4), date(2021, 1, 11)]
        );
    }

    #[test]
    fn quarter_boundaries_align_to_quarter_start() {
        let boundaries = period_boundaries(Granularity::Quarter, "2021-02-10", "2021-08-01").unwrap();
        assert_eq!(
            boundaries,
            vec![date(2021, 1, 1), date(2021, 4, 1), date(2021, 7, 1)]
        );
    }

    #[test]
    fn year_and_day_boundaries() {
        let years = period_boundaries(Granularity::Year, "2019-06-01", "2021-01-01").unwrap();
        assert_eq!(years, vec![date(2019, 1, 1), date(2020, 1, 1), date(2021, 1, 1)]);

        let days = period_boundaries(Granularity::Day, "2021-02-27", "2021-03-01").unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[2], date(2021, 3, 1));
    }

    #[test]
    fn sub_day_granularities() {
        let hours =
            period_boundaries(Granularity::Hour, "2021-01-01T22:15:00", "2021-01-02T00:30:00")
                .unwrap();
        assert_eq!(hours.len(), 3);
        assert_eq!(
            hours[0],
            NaiveDate::from_ymd_opt(2021, 1, 1)
                .unwrap()
                .and_hms_opt(22, 0, 0)
                .unwrap()
        );

        let minutes =
            period_boundaries(Granularity::Minute, "2021-01-01T00:00:30", "2021-01-01T00:02:00")
                .unwrap();
        assert_eq!(minutes.len(), 3);
    }

    #[test]
    fn inverted_range_is_empty() {
        let boundaries = period_boundaries(Granularity::Day, "2021-03-01", "2021-01-01").unwrap();
        assert!(boundaries.is_empty());
    }

    #[test]
    fn unparseable_bound_is_an_error() {
        let err = period_boundaries(Granularity::Day, "last tuesday", "2021-01-01").unwrap_err();
        assert!(matches!(err, StrataError::Assembly(_)));
    }

    #[test]
    fn single_bucket_range() {
        let boundaries = period_boundaries(Granularity::Month, "2021-05-01", "2021-05-01").unwrap();
        assert_eq!(boundaries, vec![date(2021, 5, 1)]);
    }
}
