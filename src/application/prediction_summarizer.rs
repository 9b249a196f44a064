// Prediction rollups: point-in-time, windowed and per-day
use crate::application::stats::round_to;
use crate::domain::prediction::{
    DailySummary, PredictionRecord, PredictionStatsSummary, PredictionWindow, UNKNOWN_PART,
    anomaly_ratio_exceeded, classify, is_reportable_part,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

pub const NO_DATA_MESSAGE: &str = "No prediction data found for the specified time range";
const LATEST_PREDICTIONS: usize = 5;
const LAST_7_DAYS: i64 = 7;

/// Summarize `records` for `window` as of `now`.
pub fn point_stats(
    records: &[PredictionRecord],
    window: PredictionWindow,
    now: DateTime<Utc>,
) -> PredictionStatsSummary {
    let mut records: Vec<PredictionRecord> = match window {
        PredictionWindow::Last7Days => {
            let since = now - Duration::days(LAST_7_DAYS);
            records
                .iter()
                .filter(|r| r.timestamp >= since && r.timestamp <= now)
                .cloned()
                .collect()
        }
        PredictionWindow::Present | PredictionWindow::AllTime => records.to_vec(),
    };
    // most recent first; stable so equal timestamps keep their input order
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    if records.is_empty() {
        return PredictionStatsSummary::empty(NO_DATA_MESSAGE, now);
    }

    match window {
        PredictionWindow::Present => latest_stats(records.swap_remove(0)),
        PredictionWindow::Last7Days | PredictionWindow::AllTime => windowed_stats(records, now),
    }
}

/// The most recent record reported as-is, without averaging.
fn latest_stats(record: PredictionRecord) -> PredictionStatsSummary {
    let anomaly = record.anomaly;
    PredictionStatsSummary {
        total_predictions: 1,
        anomaly_count: usize::from(anomaly),
        anomaly_percentage: if anomaly { 100.0 } else { 0.0 },
        failure_probability_avg: round_to(record.failure_prob, 2),
        health_index_avg: round_to(record.health_index, 1),
        part_at_risk: record.part_at_risk(),
        status: classify(anomaly, record.failure_prob, record.health_index),
        data_timestamp: record.timestamp,
        latest_predictions: vec![record],
        error: None,
    }
}

fn windowed_stats(records: Vec<PredictionRecord>, now: DateTime<Utc>) -> PredictionStatsSummary {
    let total = records.len();
    let anomaly_count = records.iter().filter(|r| r.anomaly).count();
    let failure_prob_avg = records.iter().map(|r| r.failure_prob).sum::<f64>() / total as f64;
    let health_index_avg = records.iter().map(|r| r.health_index).sum::<f64>() / total as f64;

    let parts: Vec<String> = records.iter().map(PredictionRecord::part_at_risk).collect();
    let part_at_risk = most_common_part(parts.iter().map(String::as_str));

    PredictionStatsSummary {
        total_predictions: total,
        anomaly_count,
        anomaly_percentage: round_to(anomaly_count as f64 / total as f64 * 100.0, 1),
        failure_probability_avg: round_to(failure_prob_avg, 2),
        health_index_avg: round_to(health_index_avg, 1),
        part_at_risk,
        status: classify(
            anomaly_ratio_exceeded(anomaly_count, total),
            failure_prob_avg,
            health_index_avg,
        ),
        latest_predictions: records.into_iter().take(LATEST_PREDICTIONS).collect(),
        data_timestamp: now,
        error: None,
    }
}

/// Most frequent reportable part; ties go to the part seen first.
pub fn most_common_part<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for part in parts.into_iter().filter(|p| is_reportable_part(p)) {
        match counts.iter_mut().find(|(name, _)| *name == part) {
            Some((_, count)) => *count += 1,
            None => counts.push((part, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (part, count) in counts {
        if best.is_none_or(|(_, highest)| count > highest) {
            best = Some((part, count));
        }
    }

    best.map(|(part, _)| part.to_string())
        .unwrap_or_else(|| UNKNOWN_PART.to_string())
}

#[derive(Debug, Default)]
struct DayBucket {
    total: usize,
    anomaly_count: usize,
    failure_prob_sum: f64,
    health_index_sum: f64,
    rul_sum: f64,
    rul_count: usize,
}

impl DayBucket {
    fn add(&mut self, record: &PredictionRecord) {
        self.total += 1;
        if record.anomaly {
            self.anomaly_count += 1;
        }
        self.failure_prob_sum += record.failure_prob;
        self.health_index_sum += record.health_index;
        if let Some(rul) = record.rul.as_ref().and_then(|r| r.as_f64()) {
            self.rul_sum += rul;
            self.rul_count += 1;
        }
    }

    fn summarize(self, date: NaiveDate) -> DailySummary {
        let total = self.total as f64;
        let failure_prob_avg = self.failure_prob_sum / total;
        let health_index_avg = self.health_index_sum / total;
        let rul_avg = if self.rul_count > 0 {
            self.rul_sum / self.rul_count as f64
        } else {
            0.0
        };

        DailySummary {
            date,
            total_predictions: self.total,
            anomaly_count: self.anomaly_count,
            anomaly_percentage: round_to(self.anomaly_count as f64 / total * 100.0, 1),
            failure_probability_avg: round_to(failure_prob_avg, 2),
            health_index_avg: round_to(health_index_avg, 1),
            rul_avg: round_to(rul_avg, 1),
            status: classify(
                anomaly_ratio_exceeded(self.anomaly_count, self.total),
                failure_prob_avg,
                health_index_avg,
            ),
        }
    }
}

/// Group by UTC calendar date, most recent day first, at most `days` entries.
/// Buckets are rebuilt from scratch on every call.
pub fn daily_rollup(records: &[PredictionRecord], days: usize) -> Vec<DailySummary> {
    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    for record in records {
        buckets.entry(record.day()).or_default().add(record);
    }

    buckets
        .into_iter()
        .rev()
        .take(days)
        .map(|(date, bucket)| bucket.summarize(date))
        .collect()
}
