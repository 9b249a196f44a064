// Date-range filtering of a time series
use crate::domain::telemetry::{DateRange, TimeSeriesPoint};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};

/// Widen `range` to whole days in `tz`: 00:00:00.000 on the start day through
/// 23:59:59.999 on the end day.
pub fn day_bounds<Tz: TimeZone>(range: &DateRange, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_day = range.start().with_timezone(tz).date_naive();
    let end_day = range.end().with_timezone(tz).date_naive();

    let start = tz
        .from_local_datetime(&start_day.and_time(NaiveTime::MIN))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| range.start());

    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    let end = tz
        .from_local_datetime(&end_day.and_time(end_of_day))
        .latest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| range.end());

    (start, end)
}

/// Points whose timestamp falls inside the full-day bounds of `range`,
/// in input order. Duplicate timestamps are kept.
pub fn filter_by_range<Tz: TimeZone>(
    points: &[TimeSeriesPoint],
    range: &DateRange,
    tz: &Tz,
) -> Vec<TimeSeriesPoint> {
    let (start, end) = day_bounds(range, tz);
    points
        .iter()
        .filter(|p| p.timestamp >= start && p.timestamp <= end)
        .copied()
        .collect()
}
