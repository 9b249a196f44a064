// Prediction service - Use case for prediction stats and daily rollups
use crate::application::clock::Clock;
use crate::application::prediction_summarizer::{daily_rollup, point_stats};
use crate::application::telemetry_repository::{Row, RowQuery, StoreError, TelemetryRepository};
use crate::domain::prediction::{
    DailySummary, PredictionRecord, PredictionStatsSummary, PredictionWindow,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Serialize)]
pub struct DailyRollup {
    pub daily: Vec<DailySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub healthy: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct PredictionService {
    repository: Arc<dyn TelemetryRepository>,
    clock: Arc<dyn Clock>,
    table: String,
    latest: Arc<RwLock<HashMap<PredictionWindow, PredictionStatsSummary>>>,
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn days_before(now: DateTime<Utc>, days: usize) -> Option<DateTime<Utc>> {
    let days = i64::try_from(days).ok()?;
    now.checked_sub_signed(Duration::try_days(days)?)
}

fn decode_records(rows: &[Row]) -> Vec<PredictionRecord> {
    let records: Vec<PredictionRecord> = rows.iter().filter_map(PredictionRecord::from_row).collect();
    if records.len() < rows.len() {
        tracing::warn!("Skipped {} malformed prediction rows", rows.len() - records.len());
    }
    records
}

impl PredictionService {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        clock: Arc<dyn Clock>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            clock,
            table: table.into(),
            latest: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn window_query(&self, window: PredictionWindow, now: DateTime<Utc>) -> RowQuery {
        let query = RowQuery::select(&self.table);
        match window {
            PredictionWindow::Present => query.order("timestamp", false).limit(1),
            PredictionWindow::Last7Days => query
                .gte("timestamp", iso(now - Duration::days(7)))
                .lte("timestamp", iso(now))
                .order("timestamp", false),
            PredictionWindow::AllTime => query.order("timestamp", false),
        }
    }

    /// Query and summarize. Store failures come back as an empty summary
    /// carrying the error text.
    pub async fn stats(&self, window: PredictionWindow) -> PredictionStatsSummary {
        let now = self.clock.now();
        let query = self.window_query(window, now);

        let summary = match self.repository.select(&query).await {
            Ok(rows) => point_stats(&decode_records(&rows), window, now),
            Err(e) => {
                tracing::error!("Error getting prediction stats: {}", e);
                PredictionStatsSummary::empty(format!("Error fetching prediction data: {}", e), now)
            }
        };

        self.latest
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(window, summary.clone());
        summary
    }

    /// Last summary computed for `window`, if any.
    pub fn cached_stats(&self, window: PredictionWindow) -> Option<PredictionStatsSummary> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&window)
            .cloned()
    }

    pub async fn daily(&self, days: usize) -> DailyRollup {
        let now = self.clock.now();
        let mut query = RowQuery::select(&self.table);
        // a window reaching past the representable range covers all history
        if let Some(since) = days_before(now, days) {
            query = query.gte("timestamp", iso(since));
        }
        let query = query.lte("timestamp", iso(now)).order("timestamp", true);

        match self.repository.select(&query).await {
            Ok(rows) if rows.is_empty() => DailyRollup {
                daily: Vec::new(),
                error: Some("No data found for the specified time range".to_string()),
            },
            Ok(rows) => DailyRollup {
                daily: daily_rollup(&decode_records(&rows), days),
                error: None,
            },
            Err(e) => {
                tracing::error!("Error getting daily prediction data: {}", e);
                DailyRollup {
                    daily: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn last_prediction_time(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let query = RowQuery::select(&self.table)
            .columns(["timestamp"])
            .order("timestamp", false)
            .limit(1);
        let rows = self.repository.select(&query).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("timestamp"))
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&Utc)))
    }

    pub async fn store_status(&self) -> StoreStatus {
        let query = RowQuery::select(&self.table).columns(["timestamp"]).limit(1);
        match self.repository.select(&query).await {
            Ok(_) => StoreStatus {
                healthy: true,
                status: "Connected".to_string(),
                error: None,
            },
            Err(e) => {
                tracing::error!("Data store connection error: {}", e);
                StoreStatus {
                    healthy: false,
                    status: "Error connecting to database".to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
