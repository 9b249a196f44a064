// Graph service - Use case for building parameter charts
use crate::application::clock::Clock;
use crate::application::downsampler::downsample;
use crate::application::series_filter::{day_bounds, filter_by_range};
use crate::application::stats::{aggregate, series_trend};
use crate::application::telemetry_repository::{RowQuery, TelemetryRepository};
use crate::domain::sensor::SensorParameter;
use crate::domain::telemetry::{ChartView, SeriesStats, TimeSeriesPoint, Timeframe};
use chrono::{Duration, Local, SecondsFormat, TimeZone};
use serde::Serialize;
use std::sync::Arc;

const VIBRATION_SAMPLE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct ChartSettings {
    pub max_points: usize,
    pub history_days: i64,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            max_points: 100,
            history_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisStats {
    pub parameter: SensorParameter,
    pub title: String,
    pub stats: SeriesStats,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VibrationBreakdown {
    pub axes: Vec<AxisStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct GraphService<Tz: TimeZone = Local> {
    repository: Arc<dyn TelemetryRepository>,
    clock: Arc<dyn Clock>,
    table: String,
    settings: ChartSettings,
    tz: Tz,
}

impl GraphService<Local> {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        clock: Arc<dyn Clock>,
        table: impl Into<String>,
        settings: ChartSettings,
    ) -> Self {
        Self::with_timezone(repository, clock, table, settings, Local)
    }
}

impl<Tz: TimeZone> GraphService<Tz>
where
    Tz::Offset: std::fmt::Display,
{
    pub fn with_timezone(
        repository: Arc<dyn TelemetryRepository>,
        clock: Arc<dyn Clock>,
        table: impl Into<String>,
        settings: ChartSettings,
        tz: Tz,
    ) -> Self {
        Self {
            repository,
            clock,
            table: table.into(),
            settings,
            tz,
        }
    }

    /// Fetch, filter, downsample and summarize one parameter.
    pub async fn chart(&self, parameter: SensorParameter, timeframe: Timeframe) -> ChartView {
        let now = self.clock.now();
        let range = timeframe.range(now);

        let (range_start, _) = day_bounds(&range, &self.tz);
        let mut query = RowQuery::select(&self.table).columns(["timestamp", parameter.column()]);
        // no lower bound when the history window leaves the representable range
        if let Some(history_start) = Duration::try_days(self.settings.history_days)
            .and_then(|history| now.checked_sub_signed(history))
        {
            let since = history_start.min(range_start);
            query = query.gte("timestamp", since.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        let query = query.order("timestamp", true);

        let rows = match self.repository.select(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Error fetching {} series: {}", parameter.column(), e);
                return ChartView::empty(parameter, range, Some(e.to_string()));
            }
        };

        let points: Vec<TimeSeriesPoint> = rows
            .iter()
            .filter_map(|row| TimeSeriesPoint::from_row(row, parameter))
            .collect();
        tracing::debug!("Fetched {} valid {} points", points.len(), parameter.column());

        let filtered = filter_by_range(&points, &range, &self.tz);
        tracing::debug!("Filtered to {} data points", filtered.len());

        let values: Vec<f64> = filtered.iter().map(|p| p.value).collect();
        let stats = aggregate(&values);
        let trend = series_trend(&filtered);

        let downsampled = downsample(&filtered, self.settings.max_points, timeframe.max_labels());
        let label_format = timeframe.label_format();
        let labels = downsampled.labels(|p| {
            p.timestamp
                .with_timezone(&self.tz)
                .format(label_format)
                .to_string()
        });

        ChartView {
            parameter,
            title: parameter.display_name(),
            unit: parameter.unit(),
            range,
            points: downsampled.points,
            labels,
            stats,
            trend,
            count: filtered.len(),
            error: None,
        }
    }

    /// Min/max/avg per vibration axis over the most recent rows.
    pub async fn vibration_breakdown(&self) -> VibrationBreakdown {
        let columns = std::iter::once("timestamp")
            .chain(SensorParameter::VIBRATION.iter().map(|p| p.column()));
        let query = RowQuery::select(&self.table)
            .columns(columns)
            .order("timestamp", false)
            .limit(VIBRATION_SAMPLE_LIMIT);

        let (rows, error) = match self.repository.select(&query).await {
            Ok(rows) => (rows, None),
            Err(e) => {
                tracing::error!("Error fetching vibration data: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let axes = SensorParameter::VIBRATION
            .into_iter()
            .map(|parameter| {
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| TimeSeriesPoint::from_row(row, parameter))
                    .map(|p| p.value)
                    .collect();
                AxisStats {
                    parameter,
                    title: parameter.display_name(),
                    stats: aggregate(&values),
                    count: values.len(),
                }
            })
            .collect();

        VibrationBreakdown { axes, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{FakeRepository, ManualClock};
    use crate::domain::telemetry::DateRange;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    const TABLE: &str = "sensor_data";

    fn service(repo: Arc<FakeRepository>, max_points: usize) -> GraphService<Utc> {
        let clock = Arc::new(ManualClock::at(2025, 3, 10, 12, 0, 0));
        let settings = ChartSettings {
            max_points,
            history_days: 30,
        };
        GraphService::with_timezone(repo, clock, TABLE, settings, Utc)
    }

    fn hourly_humidity(repo: &FakeRepository, from: DateTime<Utc>, hours: i64) {
        for h in 0..hours {
            let ts = from + Duration::hours(h);
            repo.insert(TABLE, json!({ "timestamp": ts.to_rfc3339(), "humidity": 40.0 + h as f64 }));
        }
    }

    #[tokio::test]
    async fn test_one_day_chart() {
        let repo = Arc::new(FakeRepository::new());
        let start = "2025-03-08T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        hourly_humidity(&repo, start, 60);

        let chart = service(repo, 100).chart(SensorParameter::Humidity, Timeframe::OneDay).await;

        // 1d back from the 10th 12:00 widens to the whole of the 9th and 10th
        assert_eq!(chart.count, 36);
        assert_eq!(chart.points.first().map(|p| p.value), Some(64.0));
        assert_eq!(chart.points.last().map(|p| p.value), Some(99.0));
        assert_eq!(chart.stats.min, 64.0);
        assert_eq!(chart.stats.max, 99.0);
        assert_eq!(chart.stats.average, 81.5);
        assert_eq!(chart.trend.absolute_change, 35.0);
        assert_eq!(chart.labels.len(), chart.points.len());
        assert_eq!(chart.labels.iter().filter(|l| !l.is_empty()).count(), 4);
        assert_eq!(chart.labels[0], "12:00 AM");
        assert_eq!(chart.unit, "%");
    }

    #[tokio::test]
    async fn test_chart_downsamples_but_keeps_last_point() {
        let repo = Arc::new(FakeRepository::new());
        let start = "2025-03-08T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        hourly_humidity(&repo, start, 60);

        let chart = service(repo, 10).chart(SensorParameter::Humidity, Timeframe::OneWeek).await;

        assert_eq!(chart.count, 60);
        assert!(chart.points.len() <= 11);
        assert_eq!(chart.points.last().map(|p| p.value), Some(99.0));
        // stats and trend use the full filtered series
        assert_eq!(chart.stats.min, 40.0);
        assert_eq!(chart.trend.absolute_change, 59.0);
    }

    #[tokio::test]
    async fn test_custom_range_before_history_window() {
        let repo = Arc::new(FakeRepository::new());
        let start = "2025-01-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        hourly_humidity(&repo, start, 48);

        let range = DateRange::new(
            "2025-01-06T08:00:00Z".parse().unwrap(),
            "2025-01-06T09:00:00Z".parse().unwrap(),
        );
        let chart = service(repo, 100).chart(SensorParameter::Humidity, Timeframe::Custom(range)).await;
        assert_eq!(chart.count, 24);
        assert_eq!(chart.labels[0], "Jan 6, 2025");
    }

    #[tokio::test]
    async fn test_chart_skips_malformed_rows_and_reports_errors() {
        let repo = Arc::new(FakeRepository::new());
        repo.insert(TABLE, json!({ "timestamp": "2025-03-10T01:00:00Z", "humidity": "bad" }));
        repo.insert(TABLE, json!({ "timestamp": "2025-03-10T02:00:00Z", "humidity": 41.0 }));

        let graph = service(repo.clone(), 100);
        let chart = graph.chart(SensorParameter::Humidity, Timeframe::OneDay).await;
        assert_eq!(chart.count, 1);
        assert_eq!(chart.trend.value, 0.0);

        repo.set_failing(true);
        let chart = graph.chart(SensorParameter::Humidity, Timeframe::OneDay).await;
        assert_eq!(chart.count, 0);
        assert!(chart.error.is_some());
        assert_eq!(chart.stats, SeriesStats::default());
    }

    #[tokio::test]
    async fn test_unrepresentable_history_window_reads_everything() {
        let repo = Arc::new(FakeRepository::new());
        let start = "2025-03-08T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        hourly_humidity(&repo, start, 60);

        let clock = Arc::new(ManualClock::at(2025, 3, 10, 12, 0, 0));
        let settings = ChartSettings {
            max_points: 100,
            history_days: i64::MAX,
        };
        let graph = GraphService::with_timezone(repo, clock, TABLE, settings, Utc);
        let chart = graph.chart(SensorParameter::Humidity, Timeframe::OneWeek).await;

        assert!(chart.error.is_none());
        assert_eq!(chart.count, 60);
    }

    #[tokio::test]
    async fn test_vibration_breakdown() {
        let repo = Arc::new(FakeRepository::new());
        repo.insert(
            TABLE,
            json!({ "timestamp": "2025-03-10T01:00:00Z", "compressor_vibration": 2.0, "compressor_vibration_x": 1.0 }),
        );
        repo.insert(
            TABLE,
            json!({ "timestamp": "2025-03-10T02:00:00Z", "compressor_vibration": 4.0, "compressor_vibration_x": 3.0 }),
        );

        let breakdown = service(repo, 100).vibration_breakdown().await;
        assert_eq!(breakdown.axes.len(), 4);
        assert_eq!(breakdown.axes[0].stats.average, 3.0);
        assert_eq!(breakdown.axes[1].stats.max, 3.0);
        assert_eq!(breakdown.axes[3].count, 0);
    }
}
