// Series statistics and trend calculation
use crate::domain::telemetry::{SeriesStats, TimeSeriesPoint, Trend};

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Average, max and min rounded to two decimals. An empty input yields all
/// zeros; callers distinguish "no data" by the sample count.
pub fn aggregate(values: &[f64]) -> SeriesStats {
    if values.is_empty() {
        return SeriesStats::default();
    }

    let sum: f64 = values.iter().sum();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);

    SeriesStats {
        average: round_to(sum / values.len() as f64, 2),
        max: round_to(max, 2),
        min: round_to(min, 2),
    }
}

/// Percentage change from `first` to `last`. A zero baseline falls back to
/// `absolute_change * 100`.
pub fn trend_percentage(first: f64, last: f64) -> Trend {
    let absolute_change = last - first;
    let value = if first != 0.0 {
        absolute_change / first.abs() * 100.0
    } else {
        absolute_change * 100.0
    };

    Trend {
        value: round_to(value, 2),
        is_positive: value >= 0.0,
        absolute_change: round_to(absolute_change, 2),
    }
}

/// Trend between the first and last point; neutral for fewer than two points.
pub fn series_trend(points: &[TimeSeriesPoint]) -> Trend {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 => trend_percentage(first.value, last.value),
        _ => Trend::default(),
    }
}
