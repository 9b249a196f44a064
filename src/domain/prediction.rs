// Prediction domain models
use super::sensor::{numeric_value, parse_timestamp};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Remaining useful life as stored: either a number or free text that may
/// carry a "(Part at risk: <name>)" annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rul {
    Numeric(f64),
    Text(String),
}

impl Rul {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Rul::Numeric(v) => Some(*v),
            Rul::Text(_) => None,
        }
    }

    /// Part named in the annotation, or "unknown".
    pub fn part_at_risk(&self) -> String {
        match self {
            Rul::Text(text) => extract_part_at_risk(text).unwrap_or_else(|| UNKNOWN_PART.to_string()),
            Rul::Numeric(_) => UNKNOWN_PART.to_string(),
        }
    }
}

pub const UNKNOWN_PART: &str = "unknown";
const NO_PART: &str = "none";
const PART_AT_RISK_MARKER: &str = "(Part at risk: ";

/// Extract `<name>` from `... (Part at risk: <name>) ...`. The space after
/// the colon is required; the name runs up to the first closing parenthesis
/// and is trimmed.
pub fn extract_part_at_risk(text: &str) -> Option<String> {
    let start = text.find(PART_AT_RISK_MARKER)? + PART_AT_RISK_MARKER.len();
    let end = text[start..].find(')')?;
    let name = text[start..start + end].trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub anomaly: bool,
    pub failure_prob: f64,
    pub health_index: f64,
    pub rul: Option<Rul>,
}

impl PredictionRecord {
    /// Decode a `predictions` row. Rows without a timestamp, failure
    /// probability or health index are malformed and yield `None`.
    pub fn from_row(row: &Map<String, Value>) -> Option<Self> {
        let timestamp = parse_timestamp(row.get("timestamp")?)?;
        let failure_prob = numeric_value(row.get("failure_prob")?)?;
        let health_index = numeric_value(row.get("health_index")?)?;
        let anomaly = row.get("anomaly").and_then(Value::as_bool).unwrap_or(false);
        let rul = match row.get("rul") {
            Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).map(Rul::Numeric),
            Some(Value::String(s)) => Some(Rul::Text(s.clone())),
            _ => None,
        };

        Some(Self {
            timestamp,
            anomaly,
            failure_prob,
            health_index,
            rul,
        })
    }

    pub fn part_at_risk(&self) -> String {
        self.rul
            .as_ref()
            .map(Rul::part_at_risk)
            .unwrap_or_else(|| UNKNOWN_PART.to_string())
    }

    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// "none" and "unknown" never win the most-common-part vote.
pub fn is_reportable_part(part: &str) -> bool {
    part != UNKNOWN_PART && part != NO_PART
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Critical,
    Warning,
    Normal,
    Unknown,
}

/// Three-tier classification. `anomalous` is the record's own flag, or for
/// windows whether more than 30% of records were anomalous.
pub fn classify(anomalous: bool, failure_prob: f64, health_index: f64) -> HealthStatus {
    if anomalous || failure_prob > 0.7 || health_index < 30.0 {
        HealthStatus::Critical
    } else if failure_prob > 0.3 || health_index < 60.0 {
        HealthStatus::Warning
    } else {
        HealthStatus::Normal
    }
}

pub const ANOMALY_RATIO_THRESHOLD: f64 = 0.3;

pub fn anomaly_ratio_exceeded(anomaly_count: usize, total: usize) -> bool {
    anomaly_count as f64 > total as f64 * ANOMALY_RATIO_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionWindow {
    Present,
    Last7Days,
    AllTime,
}

impl PredictionWindow {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "present" => Some(PredictionWindow::Present),
            "last7days" => Some(PredictionWindow::Last7Days),
            "alltime" => Some(PredictionWindow::AllTime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionStatsSummary {
    pub total_predictions: usize,
    pub anomaly_count: usize,
    pub anomaly_percentage: f64,
    pub failure_probability_avg: f64,
    pub health_index_avg: f64,
    pub part_at_risk: String,
    pub status: HealthStatus,
    pub latest_predictions: Vec<PredictionRecord>,
    pub data_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionStatsSummary {
    pub fn empty(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            total_predictions: 0,
            anomaly_count: 0,
            anomaly_percentage: 0.0,
            failure_probability_avg: 0.0,
            health_index_avg: 0.0,
            part_at_risk: UNKNOWN_PART.to_string(),
            status: HealthStatus::Unknown,
            latest_predictions: Vec::new(),
            data_timestamp: now,
            error: Some(error.into()),
        }
    }
}

/// Per-day rollup, one per UTC calendar date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_predictions: usize,
    pub anomaly_count: usize,
    pub anomaly_percentage: f64,
    pub failure_probability_avg: f64,
    pub health_index_avg: f64,
    pub rul_avg: f64,
    pub status: HealthStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_part_at_risk() {
        assert_eq!(
            extract_part_at_risk("120 hours (Part at risk: Compressor Motor )"),
            Some("Compressor Motor".to_string())
        );
        assert_eq!(extract_part_at_risk("120 hours"), None);
        assert_eq!(extract_part_at_risk("(Part at risk: )"), None);
        assert_eq!(extract_part_at_risk("(Part at risk: fan"), None);
        assert_eq!(extract_part_at_risk("(Part at risk:fan)"), None);
        assert_eq!(extract_part_at_risk("(Part at risk:  fan )"), Some("fan".to_string()));
    }

    #[test]
    fn test_part_at_risk_falls_back_to_unknown() {
        assert_eq!(Rul::Numeric(42.0).part_at_risk(), "unknown");
        assert_eq!(Rul::Text("soon".into()).part_at_risk(), "unknown");
        assert_eq!(Rul::Text("3 days (Part at risk: fan)".into()).part_at_risk(), "fan");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(false, 0.8, 50.0), HealthStatus::Critical);
        assert_eq!(classify(true, 0.1, 90.0), HealthStatus::Critical);
        assert_eq!(classify(false, 0.1, 20.0), HealthStatus::Critical);
        assert_eq!(classify(false, 0.2, 50.0), HealthStatus::Warning);
        assert_eq!(classify(false, 0.4, 90.0), HealthStatus::Warning);
        assert_eq!(classify(false, 0.1, 80.0), HealthStatus::Normal);
    }

    #[test]
    fn test_anomaly_ratio_threshold_is_strict() {
        assert!(!anomaly_ratio_exceeded(3, 10));
        assert!(anomaly_ratio_exceeded(4, 10));
        assert!(!anomaly_ratio_exceeded(0, 0));
    }

    #[test]
    fn test_record_from_row() {
        let row = json!({
            "timestamp": "2025-03-01T23:30:00+00:00",
            "anomaly": true,
            "failure_prob": 0.42,
            "health_index": 71.5,
            "rul": "80 hours (Part at risk: condenser fan)",
        });
        let record = PredictionRecord::from_row(row.as_object().unwrap()).unwrap();
        assert!(record.anomaly);
        assert_eq!(record.part_at_risk(), "condenser fan");
        assert_eq!(record.day(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());

        let row = json!({ "timestamp": "2025-03-01T23:30:00Z", "health_index": 70 });
        assert!(PredictionRecord::from_row(row.as_object().unwrap()).is_none());
    }
}
