// Telemetry data domain models
use super::sensor::{SensorParameter, numeric_value, parse_timestamp};
use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Decode one parameter column of a store row; `None` for rows with a
    /// malformed timestamp or value.
    pub fn from_row(row: &Map<String, Value>, parameter: SensorParameter) -> Option<Self> {
        let timestamp = parse_timestamp(row.get("timestamp")?)?;
        let value = numeric_value(row.get(parameter.column())?)?;
        Some(Self::new(timestamp, value))
    }
}

/// Inclusive range of instants. `start <= end` is enforced on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    /// Swaps the bounds if they arrive reversed.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Chart timeframe selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    OneDay,
    OneWeek,
    OneMonth,
    Custom(DateRange),
}

impl Timeframe {
    pub fn parse(
        value: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        match value {
            "1d" => Some(Timeframe::OneDay),
            "1w" => Some(Timeframe::OneWeek),
            "1m" => Some(Timeframe::OneMonth),
            "custom" => match (start, end) {
                (Some(s), Some(e)) => Some(Timeframe::Custom(DateRange::new(s, e))),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn range(&self, now: DateTime<Utc>) -> DateRange {
        match self {
            Timeframe::OneDay => DateRange::new(now - Duration::days(1), now),
            Timeframe::OneWeek => DateRange::new(now - Duration::weeks(1), now),
            Timeframe::OneMonth => {
                let start = now.checked_sub_months(Months::new(1)).unwrap_or(now - Duration::days(30));
                DateRange::new(start, now)
            }
            Timeframe::Custom(range) => *range,
        }
    }

    pub fn max_labels(&self) -> usize {
        match self {
            Timeframe::OneDay => 4,
            Timeframe::OneWeek => 5,
            _ => 6,
        }
    }

    /// strftime pattern for x-axis labels
    pub fn label_format(&self) -> &'static str {
        match self {
            Timeframe::OneDay => "%-I:%M %p",
            Timeframe::OneWeek => "%a, %b %-d",
            Timeframe::OneMonth => "%b %-d",
            Timeframe::Custom(_) => "%b %-d, %Y",
        }
    }
}

/// Average/min/max of a series, rounded to two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeriesStats {
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub value: f64,
    pub is_positive: bool,
    pub absolute_change: f64,
}

impl Default for Trend {
    fn default() -> Self {
        Self {
            value: 0.0,
            is_positive: true,
            absolute_change: 0.0,
        }
    }
}

/// Everything needed to draw one parameter chart.
#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub parameter: SensorParameter,
    pub title: String,
    pub unit: &'static str,
    pub range: DateRange,
    pub points: Vec<TimeSeriesPoint>,
    pub labels: Vec<String>,
    pub stats: SeriesStats,
    pub trend: Trend,
    /// Samples inside the range before downsampling; 0 means no data.
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChartView {
    pub fn empty(parameter: SensorParameter, range: DateRange, error: Option<String>) -> Self {
        Self {
            parameter,
            title: parameter.display_name(),
            unit: parameter.unit(),
            range,
            points: Vec::new(),
            labels: Vec::new(),
            stats: SeriesStats::default(),
            trend: Trend::default(),
            count: 0,
            error,
        }
    }
}
